use tracing::warn;

use crate::{
    amount::{parse_ui_amount, PROPOSAL_AMOUNT_DECIMALS},
    errors::CodecError,
    layout::{Reader, Writer},
    state::{FundType, FUND_NAME_LEN},
};

/// Opcodes understood by the fund program. The numbering is fixed by the program; gaps are
/// instructions this client never sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    CreateFund = 0,
    CreateProposal = 1,
    VoteProposal = 2,
    JoinFund = 3,
    ExecuteProposal = 4,
    CreateUser = 6,
    Deposit = 7,
    CreateJoinProposal = 10,
    VoteJoinProposal = 11,
    DeleteJoinProposal = 12,
    CancelProposal = 13,
    CreateLightFund = 18,
    Withdraw = 21,
}

impl TryFrom<u8> for Opcode {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::CreateFund,
            1 => Self::CreateProposal,
            2 => Self::VoteProposal,
            3 => Self::JoinFund,
            4 => Self::ExecuteProposal,
            6 => Self::CreateUser,
            7 => Self::Deposit,
            10 => Self::CreateJoinProposal,
            11 => Self::VoteJoinProposal,
            12 => Self::DeleteJoinProposal,
            13 => Self::CancelProposal,
            18 => Self::CreateLightFund,
            21 => Self::Withdraw,
            _ => {
                warn!(tag, "instruction cannot be unpacked");
                return Err(CodecError::SchemaMismatch("unknown instruction opcode"));
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundInstruction {
    // 1. Creator wallet (signer)
    // 2. Fund account
    // 3. Vault account
    // 4. Governance mint
    // 5. Metadata account
    // 6. Creator user account
    // 7. System, token, metadata programs; rent sysvar
    CreateFund {
        is_private: bool,
        name: String,
    },

    /// Amounts are raw units (already scaled by `10^PROPOSAL_AMOUNT_DECIMALS`).
    CreateProposal {
        amounts: Vec<u64>,
        slippages: Vec<u16>,
        deadline: i64,
        name: String,
    },
    VoteProposal {
        vote: bool,
        proposal_index: u8,
        vector_index: u16,
        name: String,
    },
    JoinFund {
        name: String,
    },
    ExecuteProposal {
        proposal_index: u8,
        vector_index: u16,
        name: String,
    },
    CreateUser,

    // 1. Member wallet (signer)
    // 2. Fund account
    // 3. Vault account
    // 4. Governance mint
    // 5. Member's governance token account
    // 6. Member user account
    // 7. System, token, associated-token programs
    Deposit {
        fund_type: FundType,
        amount: u64,
        min_governance_mint_amount: u64,
        name: String,
    },
    CreateJoinProposal {
        name: String,
    },
    VoteJoinProposal {
        vote: bool,
        proposal_index: u8,
        name: String,
    },
    DeleteJoinProposal {
        proposal_index: u8,
        name: String,
    },
    CancelProposal {
        proposal_index: u8,
        vector_index: u16,
        name: String,
    },
    CreateLightFund {
        is_private: bool,
        name: String,
    },
    Withdraw {
        fund_type: FundType,
        stake_percent: u8,
        name: String,
    },
}

/// Checks a fund name for use as a trailing instruction field and as a PDA seed.
pub fn validate_fund_name(name: &str) -> Result<&[u8], CodecError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::InvalidEncoding("fund name is empty"));
    }
    if bytes.len() > FUND_NAME_LEN {
        return Err(CodecError::FieldOverflow("fund name longer than 32 bytes"));
    }
    if bytes.contains(&0) {
        return Err(CodecError::InvalidEncoding("fund name contains a NUL byte"));
    }
    Ok(bytes)
}

impl FundInstruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::CreateFund { .. } => Opcode::CreateFund,
            Self::CreateProposal { .. } => Opcode::CreateProposal,
            Self::VoteProposal { .. } => Opcode::VoteProposal,
            Self::JoinFund { .. } => Opcode::JoinFund,
            Self::ExecuteProposal { .. } => Opcode::ExecuteProposal,
            Self::CreateUser => Opcode::CreateUser,
            Self::Deposit { .. } => Opcode::Deposit,
            Self::CreateJoinProposal { .. } => Opcode::CreateJoinProposal,
            Self::VoteJoinProposal { .. } => Opcode::VoteJoinProposal,
            Self::DeleteJoinProposal { .. } => Opcode::DeleteJoinProposal,
            Self::CancelProposal { .. } => Opcode::CancelProposal,
            Self::CreateLightFund { .. } => Opcode::CreateLightFund,
            Self::Withdraw { .. } => Opcode::Withdraw,
        }
    }

    pub fn fund_name(&self) -> Option<&str> {
        match self {
            Self::CreateUser => None,
            Self::CreateFund { name, .. }
            | Self::CreateProposal { name, .. }
            | Self::VoteProposal { name, .. }
            | Self::JoinFund { name }
            | Self::ExecuteProposal { name, .. }
            | Self::Deposit { name, .. }
            | Self::CreateJoinProposal { name }
            | Self::VoteJoinProposal { name, .. }
            | Self::DeleteJoinProposal { name, .. }
            | Self::CancelProposal { name, .. }
            | Self::CreateLightFund { name, .. }
            | Self::Withdraw { name, .. } => Some(name),
        }
    }

    /// Width of every field between the opcode and the trailing name.
    fn fields_len(&self) -> usize {
        match self {
            Self::CreateFund { .. } | Self::CreateLightFund { .. } => 1,
            Self::CreateProposal { amounts, slippages, .. } => {
                1 + 8 * amounts.len() + 2 * slippages.len() + 8
            }
            Self::VoteProposal { .. } => 1 + 1 + 2,
            Self::JoinFund { .. } | Self::CreateJoinProposal { .. } | Self::CreateUser => 0,
            Self::ExecuteProposal { .. } | Self::CancelProposal { .. } => 1 + 2,
            Self::Deposit { .. } => 1 + 8 + 8,
            Self::VoteJoinProposal { .. } => 1 + 1,
            Self::DeleteJoinProposal { .. } => 1,
            Self::Withdraw { .. } => 1 + 1,
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        if let Some(name) = self.fund_name() {
            validate_fund_name(name)?;
        }
        match self {
            Self::CreateProposal {
                amounts, slippages, ..
            } => {
                if amounts.is_empty() || amounts.len() > u8::MAX as usize {
                    return Err(CodecError::FieldOverflow("swap count must be 1..=255"));
                }
                if amounts.len() != slippages.len() {
                    return Err(CodecError::FieldOverflow(
                        "each swap needs exactly one amount and one slippage",
                    ));
                }
            }
            Self::Withdraw { stake_percent, .. } if !(1..=100).contains(stake_percent) => {
                return Err(CodecError::FieldOverflow("stake percent must be 1..=100"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Exact payload length: opcode, fixed fields, then the unprefixed name bytes.
    pub fn packed_len(&self) -> usize {
        1 + self.fields_len() + self.fund_name().map_or(0, str::len)
    }

    pub fn pack(&self) -> Result<Vec<u8>, CodecError> {
        self.validate()?;
        let mut buf = vec![0u8; self.packed_len()];
        let mut writer = Writer::new(&mut buf);
        writer.u8(self.opcode() as u8)?;

        match self {
            Self::CreateFund { is_private, .. } | Self::CreateLightFund { is_private, .. } => {
                writer.bool(*is_private)?;
            }
            Self::CreateProposal {
                amounts,
                slippages,
                deadline,
                ..
            } => {
                writer.u8(amounts.len() as u8)?;
                for amount in amounts {
                    writer.u64(*amount)?;
                }
                for slippage in slippages {
                    writer.u16(*slippage)?;
                }
                writer.i64(*deadline)?;
            }
            Self::VoteProposal {
                vote,
                proposal_index,
                vector_index,
                ..
            } => {
                writer.bool(*vote)?;
                writer.u8(*proposal_index)?;
                writer.u16(*vector_index)?;
            }
            Self::ExecuteProposal {
                proposal_index,
                vector_index,
                ..
            }
            | Self::CancelProposal {
                proposal_index,
                vector_index,
                ..
            } => {
                writer.u8(*proposal_index)?;
                writer.u16(*vector_index)?;
            }
            Self::Deposit {
                fund_type,
                amount,
                min_governance_mint_amount,
                ..
            } => {
                writer.u8(*fund_type as u8)?;
                writer.u64(*amount)?;
                writer.u64(*min_governance_mint_amount)?;
            }
            Self::VoteJoinProposal {
                vote,
                proposal_index,
                ..
            } => {
                writer.bool(*vote)?;
                writer.u8(*proposal_index)?;
            }
            Self::DeleteJoinProposal { proposal_index, .. } => {
                writer.u8(*proposal_index)?;
            }
            Self::Withdraw {
                fund_type,
                stake_percent,
                ..
            } => {
                writer.u8(*fund_type as u8)?;
                writer.u8(*stake_percent)?;
            }
            Self::JoinFund { .. } | Self::CreateJoinProposal { .. } | Self::CreateUser => {}
        }

        if let Some(name) = self.fund_name() {
            writer.bytes(name.as_bytes())?;
        }
        writer.finish()?;
        Ok(buf)
    }

    pub fn unpack(input: &[u8]) -> Result<Self, CodecError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(CodecError::truncated(0, 1, 0))?;
        let opcode = Opcode::try_from(tag)?;
        let mut reader = Reader::at(input, 1);

        let instruction = match opcode {
            Opcode::CreateFund => Self::CreateFund {
                is_private: reader.bool()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::CreateLightFund => Self::CreateLightFund {
                is_private: reader.bool()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::CreateProposal => {
                let swap_count = reader.u8()? as usize;
                let amounts = (0..swap_count)
                    .map(|_| reader.u64())
                    .collect::<Result<Vec<_>, _>>()?;
                let slippages = (0..swap_count)
                    .map(|_| reader.u16())
                    .collect::<Result<Vec<_>, _>>()?;
                let deadline = reader.i64()?;
                Self::CreateProposal {
                    amounts,
                    slippages,
                    deadline,
                    name: Self::unpack_name(input, &reader)?,
                }
            }
            Opcode::VoteProposal => Self::VoteProposal {
                vote: reader.bool()?,
                proposal_index: reader.u8()?,
                vector_index: reader.u16()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::JoinFund => Self::JoinFund {
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::ExecuteProposal => Self::ExecuteProposal {
                proposal_index: reader.u8()?,
                vector_index: reader.u16()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::CreateUser => {
                if !rest.is_empty() {
                    return Err(CodecError::SchemaMismatch("create-user carries no fields"));
                }
                Self::CreateUser
            }
            Opcode::Deposit => Self::Deposit {
                fund_type: FundType::from_u8(reader.u8()?)?,
                amount: reader.u64()?,
                min_governance_mint_amount: reader.u64()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::CreateJoinProposal => Self::CreateJoinProposal {
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::VoteJoinProposal => Self::VoteJoinProposal {
                vote: reader.bool()?,
                proposal_index: reader.u8()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::DeleteJoinProposal => Self::DeleteJoinProposal {
                proposal_index: reader.u8()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::CancelProposal => Self::CancelProposal {
                proposal_index: reader.u8()?,
                vector_index: reader.u16()?,
                name: Self::unpack_name(input, &reader)?,
            },
            Opcode::Withdraw => Self::Withdraw {
                fund_type: FundType::from_u8(reader.u8()?)?,
                stake_percent: reader.u8()?,
                name: Self::unpack_name(input, &reader)?,
            },
        };
        instruction.validate()?;
        Ok(instruction)
    }

    /// The name runs from the cursor to the end of the payload.
    fn unpack_name(input: &[u8], reader: &Reader<'_>) -> Result<String, CodecError> {
        let bytes = &input[reader.offset()..];
        let name = core::str::from_utf8(bytes)
            .map_err(|_| CodecError::InvalidEncoding("fund name is not valid UTF-8"))?;
        Ok(name.to_owned())
    }
}

pub fn encode_create_fund(name: &str, is_private: bool) -> Result<Vec<u8>, CodecError> {
    FundInstruction::CreateFund {
        is_private,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_create_light_fund(name: &str, is_private: bool) -> Result<Vec<u8>, CodecError> {
    FundInstruction::CreateLightFund {
        is_private,
        name: name.to_owned(),
    }
    .pack()
}

/// `amounts` are human decimal strings, scaled by `10^PROPOSAL_AMOUNT_DECIMALS` before writing.
pub fn encode_create_proposal(
    name: &str,
    amounts: &[&str],
    slippages: &[u16],
    deadline: i64,
) -> Result<Vec<u8>, CodecError> {
    let amounts = amounts
        .iter()
        .map(|amount| parse_ui_amount(amount, PROPOSAL_AMOUNT_DECIMALS))
        .collect::<Result<Vec<_>, _>>()?;
    FundInstruction::CreateProposal {
        amounts,
        slippages: slippages.to_vec(),
        deadline,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_vote_proposal(
    name: &str,
    vote: bool,
    proposal_index: u8,
    vector_index: u16,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::VoteProposal {
        vote,
        proposal_index,
        vector_index,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_join_fund(name: &str) -> Result<Vec<u8>, CodecError> {
    FundInstruction::JoinFund {
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_execute_proposal(
    name: &str,
    proposal_index: u8,
    vector_index: u16,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::ExecuteProposal {
        proposal_index,
        vector_index,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_create_user() -> Result<Vec<u8>, CodecError> {
    FundInstruction::CreateUser.pack()
}

/// `amount` is the human-entered decimal string, scaled by the token's `decimals`.
pub fn encode_deposit(
    name: &str,
    fund_type: FundType,
    amount: &str,
    decimals: u8,
    min_governance_mint_amount: u64,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::Deposit {
        fund_type,
        amount: parse_ui_amount(amount, decimals)?,
        min_governance_mint_amount,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_withdraw(
    name: &str,
    fund_type: FundType,
    stake_percent: u8,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::Withdraw {
        fund_type,
        stake_percent,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_create_join_proposal(name: &str) -> Result<Vec<u8>, CodecError> {
    FundInstruction::CreateJoinProposal {
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_vote_join_proposal(
    name: &str,
    vote: bool,
    proposal_index: u8,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::VoteJoinProposal {
        vote,
        proposal_index,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_delete_join_proposal(name: &str, proposal_index: u8) -> Result<Vec<u8>, CodecError> {
    FundInstruction::DeleteJoinProposal {
        proposal_index,
        name: name.to_owned(),
    }
    .pack()
}

pub fn encode_cancel_proposal(
    name: &str,
    proposal_index: u8,
    vector_index: u16,
) -> Result<Vec<u8>, CodecError> {
    FundInstruction::CancelProposal {
        proposal_index,
        vector_index,
        name: name.to_owned(),
    }
    .pack()
}
