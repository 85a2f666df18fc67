//! Instruction assembly: payloads from [`crate::instruction`] plus the ordered account list the
//! program expects, and the seams to the external signer and account source.

use async_trait::async_trait;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};
use spl_associated_token_account::get_associated_token_address;
use tracing::info;

use crate::{
    errors::{ClientError, CodecError},
    instruction::{self, FundInstruction},
    pda,
    state::FundType,
};

/// Source of raw account bytes (an RPC node, a test bank, a cache).
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    /// `Ok(None)` when the account does not exist.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ClientError>;
}

/// Signs with the user's key, broadcasts, and waits for confirmation.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Returns the transaction signature.
    async fn sign_and_send(&self, instructions: Vec<Instruction>) -> Result<String, ClientError>;
}

pub async fn submit<S>(sender: &S, instructions: Vec<Instruction>) -> Result<String, ClientError>
where
    S: TransactionSender + ?Sized,
{
    let opcodes: Vec<u8> = instructions
        .iter()
        .filter_map(|ix| ix.data.first().copied())
        .collect();
    let signature = sender.sign_and_send(instructions).await?;
    info!(%signature, ?opcodes, "transaction confirmed");
    Ok(signature)
}

/// Derived addresses of one fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundAddresses {
    pub fund: Pubkey,
    pub vault: Pubkey,
    /// Light funds have no governance mint.
    pub governance_mint: Option<Pubkey>,
}

impl FundAddresses {
    pub fn derive(name: &str, fund_type: FundType, program_id: &Pubkey) -> Result<Self, CodecError> {
        instruction::validate_fund_name(name)?;
        let (fund, _) = match fund_type {
            FundType::Standard => pda::find_fund_address(name, program_id)?,
            FundType::Light => pda::find_light_fund_address(name, program_id)?,
        };
        let (vault, _) = pda::find_vault_address(&fund, program_id)?;
        let governance_mint = match fund_type {
            FundType::Standard => Some(pda::find_governance_mint_address(&fund, program_id)?.0),
            FundType::Light => None,
        };
        Ok(Self {
            fund,
            vault,
            governance_mint,
        })
    }
}

/// Builds instructions for one deployment of the fund program.
#[derive(Debug, Clone, Copy)]
pub struct InstructionBuilder {
    program_id: Pubkey,
}

impl InstructionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    fn build(
        &self,
        instruction: &FundInstruction,
        accounts: Vec<AccountMeta>,
    ) -> Result<Instruction, CodecError> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data: instruction.pack()?,
        })
    }

    fn user(&self, wallet: &Pubkey) -> Result<Pubkey, CodecError> {
        pda::find_user_address(wallet, &self.program_id).map(|(address, _)| address)
    }

    pub fn create_user(&self, wallet: &Pubkey) -> Result<Instruction, CodecError> {
        self.build(
            &FundInstruction::CreateUser,
            vec![
                AccountMeta::new(*wallet, true),
                AccountMeta::new(self.user(wallet)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    pub fn create_fund(
        &self,
        creator: &Pubkey,
        name: &str,
        is_private: bool,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let mint = addresses
            .governance_mint
            .ok_or(CodecError::SchemaMismatch("standard fund without governance mint"))?;
        let (metadata, _) = pda::find_metadata_address(&mint)?;
        self.build(
            &FundInstruction::CreateFund {
                is_private,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*creator, true),
                AccountMeta::new(addresses.fund, false),
                AccountMeta::new(addresses.vault, false),
                AccountMeta::new(mint, false),
                AccountMeta::new(metadata, false),
                AccountMeta::new(self.user(creator)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new_readonly(pda::metadata_program_id(), false),
                AccountMeta::new_readonly(sysvar::rent::id(), false),
            ],
        )
    }

    pub fn create_light_fund(
        &self,
        creator: &Pubkey,
        name: &str,
        is_private: bool,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Light, &self.program_id)?;
        self.build(
            &FundInstruction::CreateLightFund {
                is_private,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*creator, true),
                AccountMeta::new(addresses.fund, false),
                AccountMeta::new(addresses.vault, false),
                AccountMeta::new(self.user(creator)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    pub fn join_fund(&self, wallet: &Pubkey, name: &str) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (join_aggregator, _) =
            pda::find_join_proposal_aggregator_address(&addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::JoinFund {
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*wallet, true),
                AccountMeta::new(addresses.fund, false),
                AccountMeta::new(join_aggregator, false),
                AccountMeta::new(self.user(wallet)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    /// `amounts` are human decimal strings; `from_assets`/`to_assets` follow the swap order.
    #[allow(clippy::too_many_arguments)]
    pub fn create_proposal(
        &self,
        proposer: &Pubkey,
        name: &str,
        aggregator_index: u8,
        from_assets: &[Pubkey],
        to_assets: &[Pubkey],
        amounts: &[&str],
        slippages: &[u16],
        deadline: i64,
    ) -> Result<Instruction, CodecError> {
        if from_assets.len() != amounts.len() || to_assets.len() != amounts.len() {
            return Err(CodecError::FieldOverflow(
                "each swap needs one source and one destination asset",
            ));
        }
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (aggregator, _) = pda::find_proposal_aggregator_address(
            aggregator_index,
            &addresses.fund,
            &self.program_id,
        )?;
        let data = instruction::encode_create_proposal(name, amounts, slippages, deadline)?;

        let mut accounts = vec![
            AccountMeta::new(*proposer, true),
            AccountMeta::new(addresses.fund, false),
            AccountMeta::new(aggregator, false),
            AccountMeta::new(self.user(proposer)?, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ];
        accounts.extend(from_assets.iter().map(|mint| AccountMeta::new_readonly(*mint, false)));
        accounts.extend(to_assets.iter().map(|mint| AccountMeta::new_readonly(*mint, false)));
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }

    pub fn vote_proposal(
        &self,
        voter: &Pubkey,
        name: &str,
        vote: bool,
        proposal_index: u8,
        vector_index: u16,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let mint = addresses
            .governance_mint
            .ok_or(CodecError::SchemaMismatch("standard fund without governance mint"))?;
        let (aggregator, _) = pda::find_proposal_aggregator_address(
            proposal_index,
            &addresses.fund,
            &self.program_id,
        )?;
        let (vote_account, _) =
            pda::find_vote_address(proposal_index, vector_index, &addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::VoteProposal {
                vote,
                proposal_index,
                vector_index,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*voter, true),
                AccountMeta::new_readonly(addresses.fund, false),
                AccountMeta::new(aggregator, false),
                AccountMeta::new(vote_account, false),
                AccountMeta::new_readonly(get_associated_token_address(voter, &mint), false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    /// `route_accounts` are the swap-route accounts the program forwards to the exchange.
    pub fn execute_proposal(
        &self,
        executor: &Pubkey,
        name: &str,
        proposal_index: u8,
        vector_index: u16,
        route_accounts: Vec<AccountMeta>,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (aggregator, _) = pda::find_proposal_aggregator_address(
            proposal_index,
            &addresses.fund,
            &self.program_id,
        )?;
        let (vote_account, _) =
            pda::find_vote_address(proposal_index, vector_index, &addresses.fund, &self.program_id)?;
        let mut accounts = vec![
            AccountMeta::new(*executor, true),
            AccountMeta::new(addresses.fund, false),
            AccountMeta::new(addresses.vault, false),
            AccountMeta::new(aggregator, false),
            AccountMeta::new_readonly(vote_account, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ];
        accounts.extend(route_accounts);
        self.build(
            &FundInstruction::ExecuteProposal {
                proposal_index,
                vector_index,
                name: name.to_owned(),
            },
            accounts,
        )
    }

    pub fn cancel_proposal(
        &self,
        proposer: &Pubkey,
        name: &str,
        proposal_index: u8,
        vector_index: u16,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (aggregator, _) = pda::find_proposal_aggregator_address(
            proposal_index,
            &addresses.fund,
            &self.program_id,
        )?;
        let (vote_account, _) =
            pda::find_vote_address(proposal_index, vector_index, &addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::CancelProposal {
                proposal_index,
                vector_index,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*proposer, true),
                AccountMeta::new_readonly(addresses.fund, false),
                AccountMeta::new(aggregator, false),
                AccountMeta::new(vote_account, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    /// `amount` is the human decimal string, scaled by the deposited token's `decimals`.
    pub fn deposit(
        &self,
        member: &Pubkey,
        name: &str,
        fund_type: FundType,
        amount: &str,
        decimals: u8,
        min_governance_mint_amount: u64,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, fund_type, &self.program_id)?;
        let data = instruction::encode_deposit(
            name,
            fund_type,
            amount,
            decimals,
            min_governance_mint_amount,
        )?;
        let mut accounts = vec![
            AccountMeta::new(*member, true),
            AccountMeta::new(addresses.fund, false),
            AccountMeta::new(addresses.vault, false),
        ];
        if let Some(mint) = addresses.governance_mint {
            accounts.push(AccountMeta::new(mint, false));
            accounts.push(AccountMeta::new(get_associated_token_address(member, &mint), false));
        }
        accounts.push(AccountMeta::new(self.user(member)?, false));
        accounts.push(AccountMeta::new_readonly(system_program::id(), false));
        if addresses.governance_mint.is_some() {
            accounts.push(AccountMeta::new_readonly(spl_token::id(), false));
            accounts.push(AccountMeta::new_readonly(spl_associated_token_account::id(), false));
        }
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }

    pub fn withdraw(
        &self,
        member: &Pubkey,
        name: &str,
        fund_type: FundType,
        stake_percent: u8,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, fund_type, &self.program_id)?;
        let mut accounts = vec![
            AccountMeta::new(*member, true),
            AccountMeta::new(addresses.fund, false),
            AccountMeta::new(addresses.vault, false),
        ];
        if let Some(mint) = addresses.governance_mint {
            accounts.push(AccountMeta::new(mint, false));
            accounts.push(AccountMeta::new(get_associated_token_address(member, &mint), false));
        }
        accounts.push(AccountMeta::new(self.user(member)?, false));
        accounts.push(AccountMeta::new_readonly(system_program::id(), false));
        if addresses.governance_mint.is_some() {
            accounts.push(AccountMeta::new_readonly(spl_token::id(), false));
        }
        self.build(
            &FundInstruction::Withdraw {
                fund_type,
                stake_percent,
                name: name.to_owned(),
            },
            accounts,
        )
    }

    pub fn create_join_proposal(&self, joiner: &Pubkey, name: &str) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (join_aggregator, _) =
            pda::find_join_proposal_aggregator_address(&addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::CreateJoinProposal {
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*joiner, true),
                AccountMeta::new_readonly(addresses.fund, false),
                AccountMeta::new(join_aggregator, false),
                AccountMeta::new(self.user(joiner)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    pub fn vote_join_proposal(
        &self,
        voter: &Pubkey,
        name: &str,
        vote: bool,
        proposal_index: u8,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (join_aggregator, _) =
            pda::find_join_proposal_aggregator_address(&addresses.fund, &self.program_id)?;
        let (join_vote, _) =
            pda::find_join_vote_address(proposal_index, &addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::VoteJoinProposal {
                vote,
                proposal_index,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*voter, true),
                AccountMeta::new(addresses.fund, false),
                AccountMeta::new(join_aggregator, false),
                AccountMeta::new(join_vote, false),
                AccountMeta::new_readonly(self.user(voter)?, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
        )
    }

    pub fn delete_join_proposal(
        &self,
        caller: &Pubkey,
        name: &str,
        proposal_index: u8,
    ) -> Result<Instruction, CodecError> {
        let addresses = FundAddresses::derive(name, FundType::Standard, &self.program_id)?;
        let (join_aggregator, _) =
            pda::find_join_proposal_aggregator_address(&addresses.fund, &self.program_id)?;
        let (join_vote, _) =
            pda::find_join_vote_address(proposal_index, &addresses.fund, &self.program_id)?;
        self.build(
            &FundInstruction::DeleteJoinProposal {
                proposal_index,
                name: name.to_owned(),
            },
            vec![
                AccountMeta::new(*caller, true),
                AccountMeta::new_readonly(addresses.fund, false),
                AccountMeta::new(join_aggregator, false),
                AccountMeta::new(join_vote, false),
            ],
        )
    }
}
