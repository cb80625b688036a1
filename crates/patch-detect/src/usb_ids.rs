//! USB Vendor/Product ID database for known control-surface boards
//!
//! This module contains VID/PID pairs for the microcontroller boards the
//! control surface has shipped on: PJRC Teensy boards, Arduino boards, and
//! clone boards behind a WCH CH340 USB-to-serial bridge.

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// PJRC Teensy boards
pub mod teensy {
    use super::UsbId;

    pub const VID: u16 = 0x16C0;

    pub const SERIAL: UsbId = UsbId::new(VID, 0x0483);
    pub const DUAL_SERIAL: UsbId = UsbId::new(VID, 0x048B);
    pub const TRIPLE_SERIAL: UsbId = UsbId::new(VID, 0x048C);

    /// All known Teensy serial product IDs
    pub const ALL_PIDS: &[u16] = &[0x0483, 0x048B, 0x048C];
}

/// Arduino boards with native USB or an on-board 16U2 bridge
pub mod arduino {
    use super::UsbId;

    pub const VID: u16 = 0x2341;
    /// Arduino.org-era boards carry a different vendor id
    pub const VID_LEGACY: u16 = 0x2A03;

    pub const UNO: UsbId = UsbId::new(VID, 0x0043);
    pub const MEGA_2560: UsbId = UsbId::new(VID, 0x0042);
    pub const LEONARDO: UsbId = UsbId::new(VID, 0x8036);
    pub const MICRO: UsbId = UsbId::new(VID, 0x8037);

    /// All known Arduino product IDs
    pub const ALL_PIDS: &[u16] = &[0x0043, 0x0042, 0x8036, 0x8037];
}

/// WCH CH340/CH341 bridges, common on clone boards
pub mod ch340 {
    use super::UsbId;

    pub const VID: u16 = 0x1A86;

    pub const CH340: UsbId = UsbId::new(VID, 0x7523);
    pub const CH341: UsbId = UsbId::new(VID, 0x5523);

    /// All known CH340/341 product IDs
    pub const ALL_PIDS: &[u16] = &[0x7523, 0x5523];
}

/// Check whether a VID/PID pair belongs to a known control-surface board
pub fn is_known_board(vid: u16, pid: u16) -> bool {
    match vid {
        teensy::VID => teensy::ALL_PIDS.contains(&pid),
        arduino::VID | arduino::VID_LEGACY => arduino::ALL_PIDS.contains(&pid),
        ch340::VID => ch340::ALL_PIDS.contains(&pid),
        _ => false,
    }
}
