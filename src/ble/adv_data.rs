//! Advertisement and scan response payloads.
//!
//! Both are plain AD structures (`[len][type][data...]`) limited to 31 bytes.
//! The advertisement carries the flags and the complete local name; the
//! 128-bit service UUID goes into the scan response since it would not fit
//! next to the name.

use heapless::{String, Vec};

/// Maximum legacy advertising payload.
pub const ADV_PAYLOAD_MAX: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
pub const AD_TYPE_UUID128_INCOMPLETE: u8 = 0x06;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

pub type AdvPayload = Vec<u8, ADV_PAYLOAD_MAX>;

/// Flags followed by the device name. A name that does not fit is cut
/// and tagged as shortened.
pub fn build_advertisement(name: &str) -> AdvPayload {
    let mut out = AdvPayload::new();
    // 3 bytes of flags always fit in an empty buffer
    let _ = out.extend_from_slice(&[2, AD_TYPE_FLAGS, FLAGS_GENERAL_DISC_NO_BREDR]);

    let room = ADV_PAYLOAD_MAX - out.len() - 2;
    let name = name.as_bytes();
    let (name, ad_type) = if name.len() > room {
        (&name[..room], AD_TYPE_SHORT_NAME)
    } else {
        (name, AD_TYPE_COMPLETE_NAME)
    };
    if !name.is_empty() {
        let _ = out.push(name.len() as u8 + 1);
        let _ = out.push(ad_type);
        let _ = out.extend_from_slice(name);
    }
    out
}

/// Complete list of 128-bit service UUIDs, one entry.
pub fn build_scan_response(uuid_le: &[u8; 16]) -> AdvPayload {
    let mut out = AdvPayload::new();
    let _ = out.push(17);
    let _ = out.push(AD_TYPE_UUID128_COMPLETE);
    let _ = out.extend_from_slice(uuid_le);
    out
}

/// Iterate over `(ad_type, data)` of well-formed AD structures.
/// Stops at the first zero length or truncated entry.
pub fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let entry = (data[i + 1], &data[i + 2..i + 1 + len]);
        i += len + 1;
        Some(entry)
    })
}

/// Check if advertisement data lists the given 128-bit UUID.
pub fn contains_uuid128(data: &[u8], uuid_le: &[u8; 16]) -> bool {
    ad_structures(data)
        .filter(|(t, _)| *t == AD_TYPE_UUID128_COMPLETE || *t == AD_TYPE_UUID128_INCOMPLETE)
        .any(|(_, uuids)| uuids.chunks_exact(16).any(|c| c == uuid_le))
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> Option<String<32>> {
    let (_, bytes) = ad_structures(data)
        .find(|(t, _)| *t == AD_TYPE_SHORT_NAME || *t == AD_TYPE_COMPLETE_NAME)?;
    let mut name = String::new();
    for &b in bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    Some(name)
}

/// Value of the flags structure, if present.
pub fn flags(data: &[u8]) -> Option<u8> {
    ad_structures(data)
        .find(|(t, _)| *t == AD_TYPE_FLAGS)
        .and_then(|(_, v)| v.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: [u8; 16] = [
        0xb9, 0x7e, 0xfc, 0xd2, 0x22, 0x8e, 0x0e, 0x09, 0x00, 0x00, 0xbd, 0x4a, 0x60, 0x21,
        0xcc, 0x8f,
    ];

    #[test]
    fn advertisement_has_flags_then_name() {
        let adv = build_advertisement("SigMon");
        assert_eq!(
            adv.as_slice(),
            &[2, 0x01, 0x06, 7, 0x09, b'S', b'i', b'g', b'M', b'o', b'n']
        );
        assert_eq!(flags(&adv), Some(FLAGS_GENERAL_DISC_NO_BREDR));
        assert_eq!(extract_device_name(&adv).unwrap().as_str(), "SigMon");
    }

    #[test]
    fn long_name_is_shortened_to_fit() {
        let adv = build_advertisement("A-very-long-device-name-that-overflows");
        assert_eq!(adv.len(), ADV_PAYLOAD_MAX);
        assert_eq!(adv[4], AD_TYPE_SHORT_NAME);
        assert_eq!(extract_device_name(&adv).unwrap().len(), 26);
    }

    #[test]
    fn empty_name_leaves_only_flags() {
        let adv = build_advertisement("");
        assert_eq!(adv.as_slice(), &[2, 0x01, 0x06]);
        assert_eq!(extract_device_name(&adv), None);
    }

    #[test]
    fn scan_response_lists_service_uuid() {
        let rsp = build_scan_response(&UUID);
        assert_eq!(rsp.len(), 18);
        assert_eq!(rsp[1], AD_TYPE_UUID128_COMPLETE);
        assert!(contains_uuid128(&rsp, &UUID));

        let mut other = UUID;
        other[0] ^= 0xff;
        assert!(!contains_uuid128(&rsp, &other));
    }

    #[test]
    fn malformed_data_is_not_overread() {
        assert!(!contains_uuid128(&[], &UUID));
        assert!(!contains_uuid128(&[0x00, 0x07], &UUID));
        // length runs past the end
        assert!(!contains_uuid128(&[0x11, 0x07, 0xb9, 0x7e], &UUID));
        assert_eq!(extract_device_name(&[0x05, 0x09, b'a']), None);
        assert_eq!(ad_structures(&[0x00]).count(), 0);
    }
}
