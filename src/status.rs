//! # Operator-visible status panel.
//!
//! [`StatusPanel`] is the only writer of the [`Display`]. It remembers the
//! last digit triple so that returning to [`DeviceStatus::Normal`] restores
//! it, and it suppresses digit updates while an error status is shown.
//!
//! | Status        | Rendered as        |
//! |---------------|--------------------|
//! | `Normal`      | last digit triple  |
//! | `LinkError`   | `W`                |
//! | `BrokerError` | `M`                |
//! | `ApiWaiting`  | `-`                |
//! | `ApiError`    | `E`                |

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::ports::Display;
use crate::remote::{Quantities, TicketId};

/// Device status shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    #[default]
    Normal,
    LinkError,
    BrokerError,
    ApiWaiting,
    ApiError,
}

impl DeviceStatus {
    /// Status character; `None` for `Normal`, which shows digits.
    pub fn as_char(self) -> Option<char> {
        match self {
            DeviceStatus::Normal => None,
            DeviceStatus::LinkError => Some('W'),
            DeviceStatus::BrokerError => Some('M'),
            DeviceStatus::ApiWaiting => Some('-'),
            DeviceStatus::ApiError => Some('E'),
        }
    }
}

#[derive(Debug, Default)]
struct PanelState {
    status: DeviceStatus,
    digits: [u8; 3],
}

/// Facade over the [`Display`] shared by all components.
pub struct StatusPanel {
    display: Arc<dyn Display>,
    state: Mutex<PanelState>,
}

impl StatusPanel {
    pub fn new(display: Arc<dyn Display>) -> Self {
        Self {
            display,
            state: Mutex::new(PanelState::default()),
        }
    }

    /// Switches the status and re-renders.
    pub fn set_status(&self, status: DeviceStatus) {
        let mut st = self.state.lock();
        st.status = status;
        match status.as_char() {
            Some(c) => self.display.show_char(c),
            None => self.display.show_digits(st.digits),
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.state.lock().status
    }

    /// Stores a digit triple; it is rendered only in `Normal` status.
    pub fn show_digits(&self, digits: [u8; 3]) {
        let mut st = self.state.lock();
        st.digits = digits.map(|d| d % 10);
        if st.status == DeviceStatus::Normal {
            self.display.show_digits(st.digits);
        }
    }

    /// Last stored digit triple.
    pub fn digits(&self) -> [u8; 3] {
        self.state.lock().digits
    }

    /// Shows a ticket number (last three decimal digits).
    pub fn show_ticket(&self, ticket: TicketId) {
        self.show_digits(three_digits(u64::from(ticket)));
    }

    /// Shows a cook-time estimate in whole minutes, rounded up, capped at 999.
    pub fn show_estimate(&self, estimate: Duration) {
        let minutes = estimate.as_secs().div_ceil(60).min(999);
        self.show_digits(three_digits(minutes));
    }

    /// Shows the quantities of the first three item kinds of an order.
    pub fn show_quantities(&self, items: &Quantities) {
        let mut digits = [0u8; 3];
        for (slot, qty) in digits.iter_mut().zip(items.values()) {
            *slot = (qty % 10) as u8;
        }
        self.show_digits(digits);
    }
}

fn three_digits(n: u64) -> [u8; 3] {
    let n = n % 1000;
    [(n / 100) as u8, (n / 10 % 10) as u8, (n % 10) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Screen(Mutex<Vec<String>>);

    impl Display for Screen {
        fn show_digits(&self, d: [u8; 3]) {
            self.0.lock().push(format!("{}{}{}", d[0], d[1], d[2]));
        }
        fn show_char(&self, c: char) {
            self.0.lock().push(c.to_string());
        }
    }

    #[test]
    fn test_error_status_hides_digits_until_normal() {
        let screen = Arc::new(Screen::default());
        let panel = StatusPanel::new(screen.clone());

        panel.set_status(DeviceStatus::LinkError);
        panel.show_ticket(7);
        panel.set_status(DeviceStatus::Normal);

        assert_eq!(*screen.0.lock(), vec!["W", "007"]);
    }

    #[test]
    fn test_estimate_rounds_up_to_minutes() {
        let screen = Arc::new(Screen::default());
        let panel = StatusPanel::new(screen.clone());

        panel.show_estimate(Duration::from_secs(170));
        assert_eq!(panel.digits(), [0, 0, 3]);

        panel.show_estimate(Duration::from_secs(10_000_000));
        assert_eq!(panel.digits(), [9, 9, 9]);
    }

    #[test]
    fn test_quantities_fill_the_first_three_slots() {
        let panel = StatusPanel::new(Arc::new(Screen::default()));
        let items: Quantities = [(2, 4), (9, 1)].into_iter().collect();
        panel.show_quantities(&items);
        assert_eq!(panel.digits(), [4, 1, 0]);
    }
}
