//! Wall-clock seam so expiry and cooldown logic can be driven deterministically.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn unix_now(&self) -> i64 {
        self.now_utc().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at_unix(secs: i64) -> Self {
        Self {
            now: std::sync::Mutex::new(DateTime::<Utc>::from_timestamp(secs, 0).unwrap()),
        }
    }

    pub fn set_unix(&self, secs: i64) {
        *self.now.lock().unwrap() = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
