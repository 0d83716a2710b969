//! Wrapping 16-bit tick counters.
//!
//! Both the server broadcast tick and the client input counter wrap at 65536.
//! Ordering and distances are only meaningful within half the counter range,
//! which is far more than any realistic amount of in-flight traffic.

/// Server broadcast counter.
pub type Tick = u16;

/// Client input sequence counter, echoed back by the server as an ack.
pub type PlayerTick = u16;

const HALF_RANGE: u16 = 32768;

/// Returns true if `a` comes after `b` in wrapping order.
pub fn tick_greater_than(a: u16, b: u16) -> bool {
    ((a > b) && (a - b <= HALF_RANGE)) || ((a < b) && (b - a > HALF_RANGE))
}

/// Returns true if `a` comes before `b` in wrapping order.
pub fn tick_less_than(a: u16, b: u16) -> bool {
    tick_greater_than(b, a)
}

/// Signed number of steps from `from` forward to `to`.
///
/// `tick_delta(65533, 5) == 8`, `tick_delta(5, 65533) == -8`.
pub fn tick_delta(from: u16, to: u16) -> i32 {
    i32::from(to.wrapping_sub(from) as i16)
}
