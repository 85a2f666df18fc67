//! Client-side codec for the investment-fund program: account decoders, instruction payloads,
//! derived addresses, and the async read/submit path built on them.

pub mod amount;
pub mod client;
pub mod config;
pub mod debounce;
pub mod errors;
pub mod instruction;
pub mod layout;
pub mod pda;
pub mod proposal;
pub mod state;
pub mod tags;
pub mod transaction;

use solana_program::pubkey::Pubkey;

solana_program::declare_id!("6xuKPdrVq1aZgUZTmNT6kEMduBiczp4ifcYhFDbLGuq5");

/// Address of the deployed fund program.
pub const PROGRAM_ID: Pubkey = ID;

pub use client::FundClient;
pub use config::ClientConfig;
pub use debounce::Debouncer;
pub use errors::{ClientError, CodecError};
pub use instruction::{FundInstruction, Opcode};
pub use proposal::{JoinProposalAggregator, ProposalAggregator, VoteAccount};
pub use state::{AddressCheck, Fund, FundAccount, FundType, LightFund, UserAccount, UserLayout};
pub use transaction::{AccountFetcher, FundAddresses, InstructionBuilder, TransactionSender};
