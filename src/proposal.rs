//! Proposal aggregators, join-proposal aggregators and vote accounts.
//!
//! The program stores these with borsh, so every nested sequence carries its own `u32` count.
//! The decoders walk a single cursor through the buffer; no offset is computed from a stride
//! except in the fixed-width join-proposal and voter groups.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{
    errors::CodecError,
    layout::{self, Reader, PUBKEY_LEN},
    pda,
};

const AGGREGATOR_FUND_OFFSET: usize = 0;
const AGGREGATOR_INDEX_OFFSET: usize = 32;
const AGGREGATOR_COUNT_OFFSET: usize = 33;
pub const AGGREGATOR_HEADER_LEN: usize = 37;

/// Smallest possible proposal: four empty sub-sequences.
pub const MIN_PROPOSAL_LEN: usize = PUBKEY_LEN + 4 * 4 + 8 * 4 + 1 + 2;

const JOIN_AGGREGATOR_FUND_OFFSET: usize = 0;
const JOIN_AGGREGATOR_COUNT_OFFSET: usize = 32;
pub const JOIN_AGGREGATOR_HEADER_LEN: usize = 36;
pub const JOIN_PROPOSAL_LEN: usize = 57;

const JOIN_PROPOSAL_JOINER_OFFSET: usize = 0;
const JOIN_PROPOSAL_VOTES_YES_OFFSET: usize = 32;
const JOIN_PROPOSAL_VOTES_NO_OFFSET: usize = 40;
const JOIN_PROPOSAL_CREATION_TIME_OFFSET: usize = 48;
const JOIN_PROPOSAL_INDEX_OFFSET: usize = 56;

const VOTE_TAG_OFFSET: usize = 0;
const VOTE_COUNT_OFFSET: usize = 1;
pub const VOTE_HEADER_LEN: usize = 5;
pub const VOTER_LEN: usize = 33;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Proposal {
    pub proposer: Pubkey,
    pub from_assets: Vec<Pubkey>,
    pub to_assets: Vec<Pubkey>,
    pub amounts: Vec<i64>,
    pub slippages: Vec<u16>,
    pub votes_yes: i64,
    pub votes_no: i64,
    pub creation_time: i64,
    pub deadline: i64,
    pub executed: bool,
    pub vector_index: u16,
}

impl Proposal {
    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            proposer: reader.address()?,
            from_assets: reader.vec(PUBKEY_LEN, |r| r.address())?,
            to_assets: reader.vec(PUBKEY_LEN, |r| r.address())?,
            amounts: reader.vec(8, |r| r.i64())?,
            slippages: reader.vec(2, |r| r.u16())?,
            votes_yes: reader.i64()?,
            votes_no: reader.i64()?,
            creation_time: reader.i64()?,
            deadline: reader.i64()?,
            executed: reader.bool()?,
            vector_index: reader.u16()?,
        })
    }

    pub fn swap_count(&self) -> usize {
        self.amounts.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalAggregator {
    pub fund: Pubkey,
    pub index: u8,
    pub proposals: Vec<Proposal>,
}

impl ProposalAggregator {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Self::decode_with_len(data).map(|(aggregator, _)| aggregator)
    }

    /// Decodes and returns the number of bytes consumed, which equals `data.len()` for a
    /// tightly packed account.
    pub fn decode_with_len(data: &[u8]) -> Result<(Self, usize), CodecError> {
        let fund = layout::read_address(data, AGGREGATOR_FUND_OFFSET)?;
        let index = layout::read_u8(data, AGGREGATOR_INDEX_OFFSET)?;
        let mut reader = Reader::at(data, AGGREGATOR_COUNT_OFFSET);
        let proposals = reader.vec(MIN_PROPOSAL_LEN, Proposal::read)?;

        debug!(%fund, index, proposals = proposals.len(), "decoded proposal aggregator");
        Ok((
            Self {
                fund,
                index,
                proposals,
            },
            reader.offset(),
        ))
    }

    /// Decodes and rejects aggregators that do not belong to `fund` at `current_index`.
    pub fn decode_for_fund(
        data: &[u8],
        fund: &Pubkey,
        current_index: u8,
    ) -> Result<Self, CodecError> {
        let aggregator = Self::decode(data)?;
        aggregator.ensure_belongs_to(fund, current_index)?;
        Ok(aggregator)
    }

    /// A fund only trusts the aggregator of its current generation.
    pub fn ensure_belongs_to(&self, fund: &Pubkey, current_index: u8) -> Result<(), CodecError> {
        if self.fund != *fund {
            warn!(expected = %fund, found = %self.fund, "aggregator owned by another fund");
            return Err(CodecError::SchemaMismatch("aggregator belongs to another fund"));
        }
        if self.index != current_index {
            warn!(expected = current_index, found = self.index, "stale proposal aggregator");
            return Err(CodecError::SchemaMismatch(
                "aggregator index differs from the fund's current index",
            ));
        }
        Ok(())
    }

    pub fn address(&self, program_id: &Pubkey) -> Result<Pubkey, CodecError> {
        pda::find_proposal_aggregator_address(self.index, &self.fund, program_id)
            .map(|(address, _)| address)
    }

    pub fn proposal(&self, vector_index: u16) -> Option<&Proposal> {
        self.proposals
            .iter()
            .find(|proposal| proposal.vector_index == vector_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct JoinProposal {
    pub joiner: Pubkey,
    pub votes_yes: i64,
    pub votes_no: i64,
    pub creation_time: i64,
    pub proposal_index: u8,
}

impl JoinProposal {
    fn decode_at(data: &[u8], base: usize) -> Result<Self, CodecError> {
        Ok(Self {
            joiner: layout::read_address(data, base + JOIN_PROPOSAL_JOINER_OFFSET)?,
            votes_yes: layout::read_i64(data, base + JOIN_PROPOSAL_VOTES_YES_OFFSET)?,
            votes_no: layout::read_i64(data, base + JOIN_PROPOSAL_VOTES_NO_OFFSET)?,
            creation_time: layout::read_i64(data, base + JOIN_PROPOSAL_CREATION_TIME_OFFSET)?,
            proposal_index: layout::read_u8(data, base + JOIN_PROPOSAL_INDEX_OFFSET)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct JoinProposalAggregator {
    pub fund: Pubkey,
    pub proposals: Vec<JoinProposal>,
}

impl JoinProposalAggregator {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let fund = layout::read_address(data, JOIN_AGGREGATOR_FUND_OFFSET)?;
        let count = Reader::at(data, JOIN_AGGREGATOR_COUNT_OFFSET).count(JOIN_PROPOSAL_LEN)?;
        let proposals = (0..count)
            .map(|i| JoinProposal::decode_at(data, JOIN_AGGREGATOR_HEADER_LEN + i * JOIN_PROPOSAL_LEN))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%fund, proposals = proposals.len(), "decoded join-proposal aggregator");
        Ok(Self { fund, proposals })
    }

    pub fn decode_for_fund(data: &[u8], fund: &Pubkey) -> Result<Self, CodecError> {
        let aggregator = Self::decode(data)?;
        if aggregator.fund != *fund {
            warn!(expected = %fund, found = %aggregator.fund, "join aggregator owned by another fund");
            return Err(CodecError::SchemaMismatch("join aggregator belongs to another fund"));
        }
        Ok(aggregator)
    }

    pub fn proposal(&self, proposal_index: u8) -> Option<&JoinProposal> {
        self.proposals
            .iter()
            .find(|proposal| proposal.proposal_index == proposal_index)
    }

    pub fn pending_for(&self, joiner: &Pubkey) -> Option<&JoinProposal> {
        self.proposals.iter().find(|proposal| proposal.joiner == *joiner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Voter {
    pub voter: Pubkey,
    pub vote: bool,
}

/// Voters of one proposal. Its identity is the `(proposal_index, vector_index, fund)` seed
/// tuple, nothing inside the account names the proposal.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VoteAccount {
    pub tag: u8,
    pub voters: Vec<Voter>,
}

impl VoteAccount {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let tag = layout::read_u8(data, VOTE_TAG_OFFSET)?;
        let count = Reader::at(data, VOTE_COUNT_OFFSET).count(VOTER_LEN)?;
        let voters = (0..count)
            .map(|i| -> Result<Voter, CodecError> {
                let base = VOTE_HEADER_LEN + i * VOTER_LEN;
                Ok(Voter {
                    voter: layout::read_address(data, base)?,
                    vote: layout::read_bool(data, base + PUBKEY_LEN)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(tag, voters = voters.len(), "decoded vote account");
        Ok(Self { tag, voters })
    }

    pub fn has_voted(&self, voter: &Pubkey) -> bool {
        self.voters.iter().any(|entry| entry.voter == *voter)
    }

    pub fn vote_of(&self, voter: &Pubkey) -> Option<bool> {
        self.voters
            .iter()
            .find(|entry| entry.voter == *voter)
            .map(|entry| entry.vote)
    }
}

pub fn decode_proposal_aggregator(data: &[u8]) -> Result<ProposalAggregator, CodecError> {
    ProposalAggregator::decode(data)
}

pub fn decode_join_proposal_aggregator(data: &[u8]) -> Result<JoinProposalAggregator, CodecError> {
    JoinProposalAggregator::decode(data)
}

pub fn decode_vote_account(data: &[u8]) -> Result<VoteAccount, CodecError> {
    VoteAccount::decode(data)
}
