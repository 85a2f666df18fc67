//! Fund tags packed into a 4-byte little-endian bitmask, one bit per tag id.

use std::collections::BTreeSet;

use crate::{errors::CodecError, layout};

pub const TAG_MASK_LEN: usize = 4;
pub const MAX_TAG_ID: u8 = 31;

/// Tag every fund carries regardless of user selection.
pub const AUTO_TAG: u8 = 0;
pub const AUTO_TAGS_MASK: u32 = 1 << AUTO_TAG;

/// Sets bit `id` for every tag and ORs in `auto_mask`.
pub fn encode_tags<I>(tag_ids: I, auto_mask: u32) -> Result<u32, CodecError>
where
    I: IntoIterator<Item = u8>,
{
    tag_ids.into_iter().try_fold(auto_mask, |mask, id| {
        if id > MAX_TAG_ID {
            return Err(CodecError::FieldOverflow("tag id must be below 32"));
        }
        Ok(mask | (1u32 << id))
    })
}

/// Every set bit position, auto tags included.
pub fn decode_tags(mask: u32) -> BTreeSet<u8> {
    (0..=MAX_TAG_ID).filter(|bit| mask & (1u32 << bit) != 0).collect()
}

/// All non-auto tags set in `mask`.
pub fn secondary_tags(mask: u32, auto_mask: u32) -> BTreeSet<u8> {
    decode_tags(mask & !auto_mask)
}

/// The single "secondary" tag shown next to a fund: the highest set bit outside `auto_mask`.
///
/// Funds created through the dashboard carry at most one secondary tag, so for those masks this
/// agrees with [`secondary_tags`]; for hand-built masks with several bits the highest one wins.
pub fn primary_secondary_tag(mask: u32, auto_mask: u32) -> Option<u8> {
    let candidates = mask & !auto_mask;
    if candidates == 0 {
        return None;
    }
    Some(MAX_TAG_ID - candidates.leading_zeros() as u8)
}

pub fn read_tag_mask(data: &[u8], offset: usize) -> Result<BTreeSet<u8>, CodecError> {
    layout::read_u32(data, offset).map(decode_tags)
}

pub fn write_tag_mask<I>(
    data: &mut [u8],
    offset: usize,
    tag_ids: I,
    auto_mask: u32,
) -> Result<(), CodecError>
where
    I: IntoIterator<Item = u8>,
{
    let mask = encode_tags(tag_ids, auto_mask)?;
    layout::write_u32(data, offset, mask)
}
