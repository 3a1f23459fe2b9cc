//! The board firmware's console menu contract.
//!
//! The LPDDR4 bring-up firmware exposes an interactive text menu over the
//! serial console. This module collects the prompts it emits, the
//! keystrokes it expects, and the timing constants of the exchange, so
//! that the sequencers never embed magic strings of their own.
//!
//! ## Input quirk
//!
//! The firmware reads numeric answers one character at a time and
//! desynchronizes if a whole string arrives in a single write. Every
//! answer is therefore sent keystroke-by-keystroke with a short
//! inter-character delay ([`INTER_KEY_DELAY`]); see
//! [`crate::console::Console::send_keys`].

use std::time::Duration;

/// Prompt patterns emitted by the firmware, matched case-insensitively
/// against the accumulated response buffer.
pub mod prompts {
    /// Top-level frequency selection prompt; also the handshake ready signal.
    pub const READY: &str = "Please Hit number key";
    /// Frequency menu banner shown before re-entering frequency selection.
    pub const FREQUENCY_SELECT: &str = "set frequency for LPDDR";
    /// PLL has locked onto the selected frequency.
    pub const PLL_LOCK: &str = "PLL LOCK";
    /// 2D training enable/disable menu.
    pub const SELECT_2D_TRAINING: &str = "select 2D training mode";
    /// 2D training finished.
    pub const TRAINING_2D_COMPLETE: &str = "2D Training Complete";
    /// Memory-test vs diagnostics menu.
    pub const SELECT_TEST_MODE: &str = "select test mode";
    /// Test byte-count menu banner.
    pub const SELECT_TEST_NUM: &str = "select test_num";
    /// Echo prefix the firmware prints for every accepted numeric entry.
    pub const INPUT_ECHO: &str = "input out_value : dec:";
    /// Memory access test has started.
    pub const START_MEMORY_TEST: &str = "Start Memory Access test";
    /// End-of-pattern menu: repeat or finish.
    pub const REPEAT_MEMORY_TESTS: &str = "Repeat memory tests";
    /// Memory access test mode exited.
    pub const FINISH_MEMORY_TEST: &str = "Finish Memory Access test";
    /// End-of-frequency prompt; acknowledge with Enter.
    pub const TURN_OFF: &str = "Please Turn-OFF SW1-1, and Hit Enter Key";
    /// Diagnostics sub-mode menu.
    pub const MODE_SELECT: &str = "ModeSelect";
    /// Diagnostics low address entry.
    pub const SET_DIAG_ADDR_LOW: &str = "Set DiagAddrLow";
    /// Diagnostics high address entry.
    pub const SET_DIAG_ADDR_HIGH: &str = "Set DiagAddrHigh";
    /// Diagnostics loop count entry.
    pub const SET_LOOP_COUNT: &str = "Set the loop count";
    /// End-of-diagnostics menu.
    pub const REPEAT_DIAGNOSTICS: &str = "Repeat diagnostics";
    /// Eye-pattern lane selection.
    pub const SELECT_LANE: &str = "Selectlane";
    /// Eye-pattern bit selection.
    pub const SELECT_BIT: &str = "Selectbit";
}

/// Menu keystrokes the firmware expects.
pub mod keys {
    /// Select the memory access test from the test-mode menu.
    pub const MEMORY_ACCESS_TEST: &str = "1";
    /// Select diagnostics from the test-mode menu.
    pub const DIAGNOSTICS_TEST: &str = "0";
    /// Enable 2D training.
    pub const ENABLE_2D_TRAINING: &str = "1";
    /// Disable 2D training.
    pub const DISABLE_2D_TRAINING: &str = "0";
    /// TX eye pattern from the diagnostics sub-menu.
    pub const TX_EYE_PATTERN: &str = "1";
    /// RX eye pattern from the diagnostics sub-menu.
    pub const RX_EYE_PATTERN: &str = "2";
    /// Simple write/read from the diagnostics sub-menu.
    pub const SIMPLE_WRITE_READ: &str = "0";
    /// Repeat the current test.
    pub const REPEAT_TEST: &str = "1";
    /// Finish the current test mode.
    pub const END_TEST: &str = "0";
}

/// Phrases that signal an eye-pattern run has produced its report.
pub const EYE_COMPLETION_PHRASES: [&str; 4] = [
    "eye pattern test complete",
    "repeat diagnostics",
    "test pass",
    "test fail",
];

/// Frequency (MHz) to menu-key mapping, in menu order.
pub const FREQUENCY_MENU: [(u32, char); 5] = [
    (400, '0'),
    (666, '1'),
    (700, '2'),
    (725, '3'),
    (800, '4'),
];

/// Look up the menu keystroke for a frequency in MHz.
pub fn frequency_key(mhz: u32) -> Option<char> {
    FREQUENCY_MENU
        .iter()
        .find(|(f, _)| *f == mhz)
        .map(|(_, k)| *k)
}

/// Baud rates the board console supports.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Byte count covering the full test range.
pub const MAX_TEST_BYTES: u64 = 2147483648;

/// Default diagnostics low address (4 hex digits).
pub const DIAG_ADDR_LOW: &str = "0000";

/// Default diagnostics high address (4 hex digits).
pub const DIAG_ADDR_HIGH: &str = "03ff";

/// Default diagnostics loop count.
pub const DIAG_LOOP_COUNT: &str = "00";

/// Number of data lanes.
pub const MAX_LANES: u8 = 4;

/// Number of bits per lane.
pub const MAX_BITS: u8 = 8;

/// Delay between individual keystrokes.
pub const INTER_KEY_DELAY: Duration = Duration::from_millis(100);

/// Window for the connection handshake to produce the ready prompt.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default wait for a generic prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for a memory-test pattern to run to completion.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Wait for an eye-pattern report.
pub const EYE_PATTERN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for a simple write/read diagnostics result.
pub const DIAGNOSTICS_TIMEOUT: Duration = Duration::from_secs(10);

/// Drain window after entering the test byte count.
pub const BYTE_COUNT_DRAIN: Duration = Duration::from_secs(15);

/// Drain window for the firmware's input echo after a pattern entry.
pub const PATTERN_ECHO_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_key_known_values() {
        assert_eq!(frequency_key(400), Some('0'));
        assert_eq!(frequency_key(666), Some('1'));
        assert_eq!(frequency_key(800), Some('4'));
    }

    #[test]
    fn test_frequency_key_unknown_value() {
        assert_eq!(frequency_key(999), None);
        assert_eq!(frequency_key(0), None);
    }

    #[test]
    fn test_frequency_menu_keys_are_distinct() {
        for (i, (_, a)) in FREQUENCY_MENU.iter().enumerate() {
            for (_, b) in &FREQUENCY_MENU[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_diag_defaults_shape() {
        assert_eq!(DIAG_ADDR_LOW.len(), 4);
        assert_eq!(DIAG_ADDR_HIGH.len(), 4);
        assert!(DIAG_ADDR_LOW.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(DIAG_ADDR_HIGH.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timeout_ordering() {
        // The pattern wait is the longest; the handshake dominates prompts.
        assert!(COMMAND_TIMEOUT > HANDSHAKE_TIMEOUT);
        assert!(HANDSHAKE_TIMEOUT > PROMPT_TIMEOUT);
        assert!(PROMPT_TIMEOUT >= EYE_PATTERN_TIMEOUT);
    }
}
