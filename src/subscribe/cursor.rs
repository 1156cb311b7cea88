//! Continuation cursor for the subscribe loop.
//!
//! The broker hands back a `(timetoken, region)` pair with every reply; the
//! cursor decides which pair the next long-poll carries. `current == 0` means
//! the next request is an initial registration; `region == -1` means unset.

/// Region sentinel meaning "unset".
pub const REGION_UNSET: i32 = -1;

/// Snapshot of the four cursor fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub current: u64,
    pub last: u64,
    pub current_region: i32,
    pub last_region: i32,
}

/// Outcome of feeding one reply into the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorAdvance {
    /// False when the reply was stale (a delayed reply after a reset) and was
    /// ignored for cursor purposes.
    pub accepted: bool,
    /// Override token consumed by this initial reply, if any. The de-dup
    /// cache purges everything at or past it.
    pub override_used: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SubscribeCursor {
    current: u64,
    last: u64,
    current_region: i32,
    last_region: i32,
    override_token: Option<u64>,
}

impl SubscribeCursor {
    pub fn new() -> Self {
        Self {
            current: 0,
            last: 0,
            current_region: REGION_UNSET,
            last_region: REGION_UNSET,
            override_token: None,
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn current_region(&self) -> i32 {
        self.current_region
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        CursorSnapshot {
            current: self.current,
            last: self.last,
            current_region: self.current_region,
            last_region: self.last_region,
        }
    }

    /// Remember a caller-requested token for the next initial registration.
    /// `None` or zero clears any pending override.
    pub fn set_override(&mut self, token: Option<u64>) {
        self.override_token = token.filter(|token| *token != 0);
    }

    /// Park the cursor for an initial registration: a non-zero `current`
    /// moves into `last` instead of being discarded.
    pub fn begin_initial(&mut self) {
        if self.current != 0 {
            self.last = self.current;
            self.last_region = self.current_region;
        }
        self.current = 0;
        self.current_region = REGION_UNSET;
    }

    /// Advance the cursor for one reply.
    ///
    /// `reuse_last` is true when configuration asks to continue from the
    /// pre-registration cursor (list change with token keeping, or restore
    /// with catch-up); a pending override supersedes it.
    pub fn accept(
        &mut self,
        timetoken: u64,
        region: i32,
        is_initial: bool,
        reuse_last: bool,
    ) -> CursorAdvance {
        if !is_initial && self.current == 0 {
            // Delayed reply that raced a reset; the events still fan out but
            // the cursor stays parked.
            return CursorAdvance {
                accepted: false,
                override_used: None,
            };
        }

        let override_token = if is_initial { self.override_token.take() } else { None };
        let mut accept_new = true;

        if is_initial && override_token.is_none() && reuse_last && self.last != 0 {
            accept_new = false;
            self.current = self.last;
            self.current_region = self.last_region;
            self.last = 0;
            self.last_region = REGION_UNSET;
        }

        if accept_new {
            if self.current != 0 {
                self.last = self.current;
                self.last_region = self.current_region;
            }
            self.current = override_token.unwrap_or(timetoken);
            self.current_region = region;
        }

        self.override_token = None;
        CursorAdvance {
            accepted: true,
            override_used: override_token,
        }
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.last = 0;
        self.current_region = REGION_UNSET;
        self.last_region = REGION_UNSET;
        self.override_token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_accepts_reply_token() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        let advance = cursor.accept(15, 2, true, false);
        assert!(advance.accepted);
        assert_eq!(
            cursor.snapshot(),
            CursorSnapshot {
                current: 15,
                last: 0,
                current_region: 2,
                last_region: REGION_UNSET,
            }
        );
    }

    #[test]
    fn test_begin_initial_parks_current_into_last() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        cursor.accept(100, 3, true, false);
        cursor.begin_initial();
        let snap = cursor.snapshot();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.last, 100);
        assert_eq!(snap.last_region, 3);
    }

    #[test]
    fn test_reuse_last_on_initial() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        cursor.accept(100, 3, true, false);
        cursor.begin_initial();
        let advance = cursor.accept(150, 4, true, true);
        assert!(advance.accepted);
        let snap = cursor.snapshot();
        assert_eq!(snap.current, 100);
        assert_eq!(snap.current_region, 3);
        assert_eq!(snap.last, 0);
    }

    #[test]
    fn test_override_supersedes_reuse() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        cursor.accept(100, 3, true, false);
        cursor.set_override(Some(60));
        cursor.begin_initial();
        let advance = cursor.accept(150, 4, true, true);
        assert_eq!(advance.override_used, Some(60));
        assert_eq!(cursor.current(), 60);
        // Consumed: the next initial reply accepts the broker token.
        cursor.begin_initial();
        let advance = cursor.accept(200, 4, true, false);
        assert_eq!(advance.override_used, None);
        assert_eq!(cursor.current(), 200);
    }

    #[test]
    fn test_zero_override_is_ignored() {
        let mut cursor = SubscribeCursor::new();
        cursor.set_override(Some(0));
        cursor.begin_initial();
        let advance = cursor.accept(25, 1, true, false);
        assert_eq!(advance.override_used, None);
        assert_eq!(cursor.current(), 25);
    }

    #[test]
    fn test_stale_continuation_is_ignored() {
        let mut cursor = SubscribeCursor::new();
        let advance = cursor.accept(99, 1, false, false);
        assert!(!advance.accepted);
        assert_eq!(cursor.current(), 0);
    }

    #[test]
    fn test_continuation_moves_current_to_last() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        cursor.accept(15, 2, true, false);
        cursor.accept(20, 2, false, false);
        let snap = cursor.snapshot();
        assert_eq!(snap.current, 20);
        assert_eq!(snap.last, 15);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut cursor = SubscribeCursor::new();
        cursor.begin_initial();
        cursor.accept(15, 2, true, false);
        cursor.set_override(Some(9));
        cursor.reset();
        assert_eq!(
            cursor.snapshot(),
            CursorSnapshot {
                current: 0,
                last: 0,
                current_region: REGION_UNSET,
                last_region: REGION_UNSET,
            }
        );
        cursor.begin_initial();
        let advance = cursor.accept(30, 1, true, false);
        assert_eq!(advance.override_used, None);
    }
}
