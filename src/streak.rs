use chrono::{Days, NaiveDate};

/// Consecutive days on which the tracker was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streak {
    pub count: u32,
    pub last_active: Option<NaiveDate>,
}

impl Streak {
    pub fn check_in(self, today: NaiveDate) -> Streak {
        if self.last_active == Some(today) {
            return self;
        }
        let yesterday = today.checked_sub_days(Days::new(1));
        let count = if self.last_active.is_some() && self.last_active == yesterday {
            self.count.saturating_add(1)
        } else {
            1
        };
        Streak {
            count,
            last_active: Some(today),
        }
    }
}
