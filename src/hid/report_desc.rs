//! HID Report Descriptors
//!
//! One fixed descriptor per [`DeviceMode`]. The OS caches these bytes at
//! enumeration, so every layout here must stay byte-for-byte stable.

use super::types::{DeviceMode, CONTACT_SLOT_LEN, MAX_CONTACTS};

/// Relative Mouse HID Report Descriptor (3 bytes report)
/// Report format:
///   [0] Buttons (3 bits) + padding (5 bits)
///   [1] X movement (signed 8-bit)
///   [2] Y movement (signed 8-bit)
pub const MOUSE: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    // Buttons (3 bits)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x03, //     Usage Maximum (3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Button bits
    // Padding (5 bits)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Constant) - Padding
    // X, Y movement
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x06, //     Input (Data, Variable, Relative) - X, Y
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// Single-point Touch Screen HID Report Descriptor (5 bytes report)
/// Report format:
///   [0] Tip switch (1 bit) + padding (7 bits)
///   [1-2] X position (16-bit, 0-32767)
///   [3-4] Y position (16-bit, 0-32767)
pub const SINGLE_TOUCH: &[u8] = &[
    0x05, 0x0D, // Usage Page (Digitizer)
    0x09, 0x04, // Usage (Touch Screen)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x22, //   Usage (Finger)
    0xA1, 0x02, //   Collection (Logical)
    // Tip switch (1 bit)
    0x09, 0x42, //     Usage (Tip Switch)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x75, 0x01, //     Report Size (1)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Tip switch
    // Padding (7 bits)
    0x75, 0x07, //     Report Size (7)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x03, //     Input (Constant, Variable) - Padding
    // X position (16-bit absolute)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x7F, // Logical Maximum (32767)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - X
    // Y position (16-bit absolute)
    0x09, 0x31, //     Usage (Y)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Y
    0xC0, //   End Collection
    0xC0, // End Collection
];

const MULTI_TOUCH_HEADER: [u8; 6] = [
    0x05, 0x0D, // Usage Page (Digitizer)
    0x09, 0x04, // Usage (Touch Screen)
    0xA1, 0x01, // Collection (Application)
];

/// One finger collection; repeated MAX_CONTACTS times (6 bytes per slot)
const MULTI_TOUCH_FINGER: [u8; 56] = [
    0x09, 0x22, //   Usage (Finger)
    0xA1, 0x02, //   Collection (Logical)
    // Tip switch (1 bit) + padding (7 bits)
    0x09, 0x42, //     Usage (Tip Switch)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x75, 0x01, //     Report Size (1)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Tip switch
    0x75, 0x07, //     Report Size (7)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x03, //     Input (Constant, Variable) - Padding
    // Contact identifier (8 bits)
    0x09, 0x51, //     Usage (Contact Identifier)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, (MAX_CONTACTS - 1) as u8, // Logical Maximum (MAX_CONTACTS - 1)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Contact id
    // X, Y position (16-bit absolute)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x7F, // Logical Maximum (32767)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - X
    0x09, 0x31, //     Usage (Y)
    0x81, 0x02, //     Input (Data, Variable, Absolute) - Y
    0x05, 0x0D, //     Usage Page (Digitizer)
    0xC0, //   End Collection
];

const MULTI_TOUCH_FOOTER: [u8; 13] = [
    0x09, 0x54, //   Usage (Contact Count)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, MAX_CONTACTS as u8, // Logical Maximum (MAX_CONTACTS)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute) - Contact count
    0xC0, // End Collection
];

const MULTI_TOUCH_LEN: usize =
    MULTI_TOUCH_HEADER.len() + MULTI_TOUCH_FINGER.len() * MAX_CONTACTS + MULTI_TOUCH_FOOTER.len();

const fn assemble_multi_touch() -> [u8; MULTI_TOUCH_LEN] {
    let mut out = [0u8; MULTI_TOUCH_LEN];
    let mut pos = 0;

    let mut i = 0;
    while i < MULTI_TOUCH_HEADER.len() {
        out[pos] = MULTI_TOUCH_HEADER[i];
        pos += 1;
        i += 1;
    }

    let mut finger = 0;
    while finger < MAX_CONTACTS {
        let mut i = 0;
        while i < MULTI_TOUCH_FINGER.len() {
            out[pos] = MULTI_TOUCH_FINGER[i];
            pos += 1;
            i += 1;
        }
        finger += 1;
    }

    let mut i = 0;
    while i < MULTI_TOUCH_FOOTER.len() {
        out[pos] = MULTI_TOUCH_FOOTER[i];
        pos += 1;
        i += 1;
    }
    out
}

static MULTI_TOUCH_BYTES: [u8; MULTI_TOUCH_LEN] = assemble_multi_touch();

/// Multi-contact Touch Screen HID Report Descriptor (MAX_CONTACTS * 6 + 1 bytes report)
/// Report format:
///   per slot: [0] Tip switch + padding, [1] Contact id, [2-3] X, [4-5] Y
///   last byte: Contact count
pub static MULTI_TOUCH: &[u8] = &MULTI_TOUCH_BYTES;

/// Report descriptor for `mode`
pub fn build_descriptor(mode: DeviceMode) -> &'static [u8] {
    match mode {
        DeviceMode::Mouse => MOUSE,
        DeviceMode::SingleTouch => SINGLE_TOUCH,
        DeviceMode::MultiTouch => MULTI_TOUCH,
    }
}

/// Size in bytes of one input report of `mode`
pub fn report_byte_length(mode: DeviceMode) -> usize {
    match mode {
        DeviceMode::Mouse => 3,
        DeviceMode::SingleTouch => 5,
        DeviceMode::MultiTouch => MAX_CONTACTS * CONTACT_SLOT_LEN + 1,
    }
}

/// HID class descriptor (9 bytes) announcing the report descriptor of `mode`
pub fn hid_descriptor(mode: DeviceMode) -> [u8; 9] {
    let len = build_descriptor(mode).len() as u16;
    [
        0x09, // bLength
        0x21, // bDescriptorType (HID)
        0x11, 0x01, // bcdHID (1.11)
        0x00, // bCountryCode
        0x01, // bNumDescriptors
        0x22, // bDescriptorType (Report)
        (len & 0xFF) as u8,
        (len >> 8) as u8,
    ]
}
