//! Program-derived addresses used by the fund program.
//!
//! Seed order and composition are part of the program's wire contract: reordering any tuple
//! below yields a different address and breaks every instruction that references it.

use solana_program::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};
use tracing::trace;

use crate::errors::CodecError;

pub const FUND_SEED: &[u8] = b"fund";
pub const LIGHT_FUND_SEED: &[u8] = b"light-fund";
pub const VAULT_SEED: &[u8] = b"vault";
pub const GOVERNANCE_SEED: &[u8] = b"governance";
pub const USER_SEED: &[u8] = b"user";
pub const VOTE_SEED: &[u8] = b"vote";
pub const JOIN_VOTE_SEED: &[u8] = b"join-vote";
pub const PROPOSAL_AGGREGATOR_SEED: &[u8] = b"proposal-aggregator";
pub const JOIN_PROPOSAL_AGGREGATOR_SEED: &[u8] = b"join-proposal-aggregator";
pub const METADATA_SEED: &[u8] = b"metadata";
pub const RENT_SEED: &[u8] = b"rent";

/// Derives the address and bump for `seeds` under `owner`.
///
/// Seeds are checked against the runtime limits first so an overlong component surfaces as
/// [`CodecError::FieldOverflow`] rather than as an exhausted bump search.
pub fn derive_address(seeds: &[&[u8]], owner: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    // The bump occupies one of the MAX_SEEDS slots.
    if seeds.len() >= MAX_SEEDS {
        return Err(CodecError::FieldOverflow("too many seed components"));
    }
    if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(CodecError::FieldOverflow("seed component longer than 32 bytes"));
    }
    let (address, bump) =
        Pubkey::try_find_program_address(seeds, owner).ok_or(CodecError::DerivationExhausted)?;
    trace!(%address, bump, "derived program address");
    Ok((address, bump))
}

/// Returns `Ok(bump)` when `expected` is the canonical address for `seeds`.
pub fn verify_address(
    expected: &Pubkey,
    seeds: &[&[u8]],
    owner: &Pubkey,
) -> Result<u8, CodecError> {
    let (address, bump) = derive_address(seeds, owner)?;
    if address != *expected {
        return Err(CodecError::SchemaMismatch("address is not the canonical derived address"));
    }
    Ok(bump)
}

pub fn find_fund_address(name: &str, program_id: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[FUND_SEED, name.as_bytes()], program_id)
}

pub fn find_light_fund_address(
    name: &str,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[LIGHT_FUND_SEED, name.as_bytes()], program_id)
}

pub fn find_vault_address(fund: &Pubkey, program_id: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[VAULT_SEED, fund.as_ref()], program_id)
}

pub fn find_governance_mint_address(
    fund: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[GOVERNANCE_SEED, fund.as_ref()], program_id)
}

pub fn find_user_address(wallet: &Pubkey, program_id: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[USER_SEED, wallet.as_ref()], program_id)
}

/// `("proposal-aggregator", index, fund)`.
pub fn find_proposal_aggregator_address(
    aggregator_index: u8,
    fund: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(
        &[PROPOSAL_AGGREGATOR_SEED, &[aggregator_index], fund.as_ref()],
        program_id,
    )
}

pub fn find_join_proposal_aggregator_address(
    fund: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[JOIN_PROPOSAL_AGGREGATOR_SEED, fund.as_ref()], program_id)
}

/// `("vote", proposal_index, vector_index as u16 LE, fund)`.
pub fn find_vote_address(
    proposal_index: u8,
    vector_index: u16,
    fund: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(
        &[
            VOTE_SEED,
            &[proposal_index],
            &vector_index.to_le_bytes(),
            fund.as_ref(),
        ],
        program_id,
    )
}

/// `("join-vote", proposal_index, fund)`.
pub fn find_join_vote_address(
    proposal_index: u8,
    fund: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[JOIN_VOTE_SEED, &[proposal_index], fund.as_ref()], program_id)
}

pub fn find_rent_address(program_id: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    derive_address(&[RENT_SEED], program_id)
}

pub fn metadata_program_id() -> Pubkey {
    Pubkey::new_from_array(mpl_token_metadata::ID.to_bytes())
}

/// Token-metadata account of `mint`, owned by the metadata program rather than the fund program.
pub fn find_metadata_address(mint: &Pubkey) -> Result<(Pubkey, u8), CodecError> {
    let metadata_program = metadata_program_id();
    derive_address(
        &[METADATA_SEED, metadata_program.as_ref(), mint.as_ref()],
        &metadata_program,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Pubkey {
        crate::id()
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = find_fund_address("Alpha", &program()).unwrap();
        let second = find_fund_address("Alpha", &program()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            Pubkey::find_program_address(&[b"fund", b"Alpha"], &program())
        );
    }

    #[test]
    fn seed_roles_are_not_conflated() {
        let (fund, _) = find_fund_address("Alpha", &program()).unwrap();
        let (light, _) = find_light_fund_address("Alpha", &program()).unwrap();
        let (vault, _) = find_vault_address(&fund, &program()).unwrap();
        let (mint, _) = find_governance_mint_address(&fund, &program()).unwrap();
        assert_ne!(fund, light);
        assert_ne!(vault, mint);
    }

    #[test]
    fn vote_seeds_encode_vector_index_little_endian() {
        let fund = Pubkey::new_from_array([7u8; 32]);
        let derived = find_vote_address(3, 0x0102, &fund, &program()).unwrap();
        let expected = Pubkey::find_program_address(
            &[b"vote", &[3], &[0x02, 0x01], fund.as_ref()],
            &program(),
        );
        assert_eq!(derived, expected);
        assert_ne!(derived, find_vote_address(3, 0x0201, &fund, &program()).unwrap());
    }

    #[test]
    fn join_vote_seeds_have_no_vector_index() {
        let fund = Pubkey::new_from_array([9u8; 32]);
        let derived = find_join_vote_address(4, &fund, &program()).unwrap();
        let expected =
            Pubkey::find_program_address(&[b"join-vote", &[4], fund.as_ref()], &program());
        assert_eq!(derived, expected);
    }

    #[test]
    fn overlong_seed_is_a_field_overflow() {
        let name = "x".repeat(33);
        assert_eq!(
            find_fund_address(&name, &program()),
            Err(CodecError::FieldOverflow("seed component longer than 32 bytes"))
        );
    }

    #[test]
    fn too_many_seeds_is_a_field_overflow() {
        let seeds: Vec<&[u8]> = vec![b"s".as_slice(); MAX_SEEDS];
        assert!(matches!(
            derive_address(&seeds, &program()),
            Err(CodecError::FieldOverflow(_))
        ));
    }

    #[test]
    fn verify_address_rejects_foreign_addresses() {
        let (fund, bump) = find_fund_address("Alpha", &program()).unwrap();
        assert_eq!(verify_address(&fund, &[b"fund", b"Alpha"], &program()), Ok(bump));
        assert!(matches!(
            verify_address(&Pubkey::default(), &[b"fund", b"Alpha"], &program()),
            Err(CodecError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn metadata_address_is_owned_by_metadata_program() {
        let mint = Pubkey::new_from_array([1u8; 32]);
        let program = metadata_program_id();
        let expected =
            Pubkey::find_program_address(&[b"metadata", program.as_ref(), mint.as_ref()], &program);
        assert_eq!(find_metadata_address(&mint).unwrap(), expected);
    }
}
