//! HID device modes and input report types

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::HidError;

/// Maximum number of contact records in one multi-touch report
pub const MAX_CONTACTS: usize = 5;

/// Logical maximum of absolute coordinates (shared by both touch modes)
pub const ABS_LOGICAL_MAX: u16 = 32767;

/// Significant bits of the mouse button byte (left, right, middle)
pub const MOUSE_BUTTON_MASK: u8 = 0x07;

/// Bytes per contact slot in a multi-touch report
pub(crate) const CONTACT_SLOT_LEN: usize = 6;

/// Opaque handle of a read request issued by the consumer
pub type RequestId = u64;

/// Device mode (report layout currently presented to the OS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    /// Relative mouse (buttons + 8-bit deltas)
    #[default]
    Mouse,
    /// Single absolute pointer
    SingleTouch,
    /// Multiple absolute contacts
    MultiTouch,
}

impl DeviceMode {
    /// All modes, in tag order
    pub const ALL: [DeviceMode; 3] = [
        DeviceMode::Mouse,
        DeviceMode::SingleTouch,
        DeviceMode::MultiTouch,
    ];

    /// Wire tag of this mode
    pub fn tag(self) -> u8 {
        match self {
            DeviceMode::Mouse => 0,
            DeviceMode::SingleTouch => 1,
            DeviceMode::MultiTouch => 2,
        }
    }

    /// Get mode name as string
    pub fn name_str(self) -> &'static str {
        match self {
            DeviceMode::Mouse => "mouse",
            DeviceMode::SingleTouch => "single_touch",
            DeviceMode::MultiTouch => "multi_touch",
        }
    }

    /// Whether reports carry absolute coordinates
    pub fn is_touch(self) -> bool {
        !matches!(self, DeviceMode::Mouse)
    }
}

impl TryFrom<u8> for DeviceMode {
    type Error = HidError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(DeviceMode::Mouse),
            1 => Ok(DeviceMode::SingleTouch),
            2 => Ok(DeviceMode::MultiTouch),
            other => Err(HidError::InvalidMode(format!("unknown mode tag {}", other))),
        }
    }
}

impl FromStr for DeviceMode {
    type Err = HidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mouse" => Ok(DeviceMode::Mouse),
            "single_touch" => Ok(DeviceMode::SingleTouch),
            "multi_touch" => Ok(DeviceMode::MultiTouch),
            other => Err(HidError::InvalidMode(format!("unknown mode name '{}'", other))),
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_str())
    }
}

/// Fixed device identity reported to the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidAttributes {
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// Device version number (BCD)
    pub version_number: u16,
}

/// One contact record of a multi-touch report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchContact {
    /// Contact identifier (0..MAX_CONTACTS)
    pub id: u8,
    /// Whether the contact touches the surface
    pub present: bool,
    /// Absolute X (0..=32767)
    pub x: u16,
    /// Absolute Y (0..=32767)
    pub y: u16,
}

/// Input report submitted by the producer, tagged by the mode it was formed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputReport {
    /// Relative mouse report
    Mouse {
        /// Button bitmask (bit 0 left, bit 1 right, bit 2 middle)
        #[serde(default)]
        buttons: u8,
        /// X movement
        #[serde(default)]
        dx: i8,
        /// Y movement
        #[serde(default)]
        dy: i8,
    },
    /// Single absolute pointer report
    SingleTouch {
        /// Contact present (tip switch)
        present: bool,
        /// Absolute X (0..=32767)
        x: u16,
        /// Absolute Y (0..=32767)
        y: u16,
    },
    /// Multi-contact report
    MultiTouch {
        /// Contact records in delivery order (at most MAX_CONTACTS)
        contacts: Vec<TouchContact>,
    },
}

impl InputReport {
    /// Mode this report was formed for
    pub fn mode(&self) -> DeviceMode {
        match self {
            InputReport::Mouse { .. } => DeviceMode::Mouse,
            InputReport::SingleTouch { .. } => DeviceMode::SingleTouch,
            InputReport::MultiTouch { .. } => DeviceMode::MultiTouch,
        }
    }

    /// Encode to the wire layout described by the mode's report descriptor
    ///
    /// Fails with [`HidError::Validation`] when a field is outside the logical
    /// range the descriptor declares.
    pub fn to_bytes(&self) -> Result<Bytes, HidError> {
        match self {
            InputReport::Mouse { buttons, dx, dy } => {
                if buttons & !MOUSE_BUTTON_MASK != 0 {
                    return Err(HidError::Validation(format!(
                        "mouse buttons {:#04x} use bits beyond the 3 declared buttons",
                        buttons
                    )));
                }
                if *dx == i8::MIN || *dy == i8::MIN {
                    return Err(HidError::Validation(
                        "mouse delta out of range -127..=127".to_string(),
                    ));
                }
                Ok(Bytes::copy_from_slice(&[*buttons, *dx as u8, *dy as u8]))
            }
            InputReport::SingleTouch { present, x, y } => {
                check_coordinates(*x, *y)?;
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u8(*present as u8);
                buf.put_u16_le(*x);
                buf.put_u16_le(*y);
                Ok(buf.freeze())
            }
            InputReport::MultiTouch { contacts } => {
                if contacts.len() > MAX_CONTACTS {
                    return Err(HidError::Validation(format!(
                        "{} contacts exceed capacity of {}",
                        contacts.len(),
                        MAX_CONTACTS
                    )));
                }
                let mut seen = [false; MAX_CONTACTS];
                let mut buf = BytesMut::with_capacity(MAX_CONTACTS * CONTACT_SLOT_LEN + 1);
                for contact in contacts {
                    let id = contact.id as usize;
                    if id >= MAX_CONTACTS {
                        return Err(HidError::Validation(format!(
                            "contact id {} out of range 0..{}",
                            contact.id, MAX_CONTACTS
                        )));
                    }
                    if seen[id] {
                        return Err(HidError::Validation(format!(
                            "duplicate contact id {}",
                            contact.id
                        )));
                    }
                    seen[id] = true;
                    check_coordinates(contact.x, contact.y)?;

                    buf.put_u8(contact.present as u8);
                    buf.put_u8(contact.id);
                    buf.put_u16_le(contact.x);
                    buf.put_u16_le(contact.y);
                }
                buf.put_bytes(0, (MAX_CONTACTS - contacts.len()) * CONTACT_SLOT_LEN);
                buf.put_u8(contacts.len() as u8);
                Ok(buf.freeze())
            }
        }
    }

    /// Decode a report of `mode` from its wire layout
    ///
    /// The inverse of [`InputReport::to_bytes`], used by consumers that want
    /// typed reports back (the replay harness, tests).
    pub fn from_bytes(mode: DeviceMode, data: &[u8]) -> Result<Self, HidError> {
        let expected = super::report_desc::report_byte_length(mode);
        if data.len() != expected {
            return Err(HidError::Validation(format!(
                "{} report must be {} bytes, got {}",
                mode,
                expected,
                data.len()
            )));
        }

        let le16 = |lo: usize| u16::from_le_bytes([data[lo], data[lo + 1]]);
        match mode {
            DeviceMode::Mouse => Ok(InputReport::Mouse {
                buttons: data[0] & MOUSE_BUTTON_MASK,
                dx: data[1] as i8,
                dy: data[2] as i8,
            }),
            DeviceMode::SingleTouch => Ok(InputReport::SingleTouch {
                present: data[0] & 0x01 != 0,
                x: le16(1),
                y: le16(3),
            }),
            DeviceMode::MultiTouch => {
                let count = data[MAX_CONTACTS * CONTACT_SLOT_LEN] as usize;
                if count > MAX_CONTACTS {
                    return Err(HidError::Validation(format!(
                        "contact count {} exceeds capacity of {}",
                        count, MAX_CONTACTS
                    )));
                }
                let contacts = (0..count)
                    .map(|slot| {
                        let base = slot * CONTACT_SLOT_LEN;
                        TouchContact {
                            present: data[base] & 0x01 != 0,
                            id: data[base + 1],
                            x: le16(base + 2),
                            y: le16(base + 4),
                        }
                    })
                    .collect();
                Ok(InputReport::MultiTouch { contacts })
            }
        }
    }
}

fn check_coordinates(x: u16, y: u16) -> Result<(), HidError> {
    if x > ABS_LOGICAL_MAX || y > ABS_LOGICAL_MAX {
        return Err(HidError::Validation(format!(
            "coordinate ({}, {}) outside 0..={}",
            x, y, ABS_LOGICAL_MAX
        )));
    }
    Ok(())
}
