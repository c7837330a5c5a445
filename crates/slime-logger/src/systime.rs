use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in the format YYYY-MM-DD HH:MM:SS TZ
#[cfg(target_family = "unix")]
pub fn now() -> String {
    use std::ffi::CStr;

    let secs = unix_timestamp() as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };

    let converted = unsafe { !libc::localtime_r(&secs, &mut tm).is_null() };
    if !converted {
        return secs.to_string();
    }

    let mut buf = [0 as libc::c_char; 100];
    let written = unsafe {
        libc::strftime(
            buf.as_mut_ptr(),
            buf.len(),
            b"%Y-%m-%d %H:%M:%S %Z\0".as_ptr() as *const libc::c_char,
            &tm,
        )
    };
    if written == 0 {
        return secs.to_string();
    }

    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Seconds since the epoch; non-unix targets have no strftime binding here.
#[cfg(not(target_family = "unix"))]
pub fn now() -> String {
    format!("{}s", unix_timestamp())
}

/// Returns the current Unix timestamp in seconds
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_timestamp_is_positive() {
        assert!(unix_timestamp() > 0);
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn test_now_has_date_shape() {
        let stamp = now();
        // YYYY-MM-DD HH:MM:SS, then the zone name
        assert!(stamp.len() >= 19, "unexpected timestamp {}", stamp);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[13..14], ":");
    }
}
