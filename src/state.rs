use solana_program::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{
    errors::CodecError,
    layout::{self, PUBKEY_LEN},
    pda,
};

pub const FUND_NAME_LEN: usize = 32;

const FUND_NAME_OFFSET: usize = 0;
const FUND_EXPECTED_MEMBERS_OFFSET: usize = 32;
const FUND_CREATOR_EXISTS_OFFSET: usize = 36;
const FUND_TOTAL_DEPOSIT_OFFSET: usize = 37;
const FUND_GOVERNANCE_MINT_OFFSET: usize = 45;
const FUND_VAULT_OFFSET: usize = 77;
const FUND_CURRENT_INDEX_OFFSET: usize = 109;
const FUND_CREATED_AT_OFFSET: usize = 110;
const FUND_IS_PRIVATE_OFFSET: usize = 118;
const FUND_MEMBER_COUNT_OFFSET: usize = 119;
pub const FUND_HEADER_LEN: usize = 123;

const LIGHT_FUND_NAME_OFFSET: usize = 0;
const LIGHT_FUND_TYPE_OFFSET: usize = 32;
const LIGHT_FUND_TOTAL_DEPOSIT_OFFSET: usize = 33;
const LIGHT_FUND_VAULT_OFFSET: usize = 41;
const LIGHT_FUND_CURRENT_INDEX_OFFSET: usize = 73;
const LIGHT_FUND_CREATED_AT_OFFSET: usize = 74;
const LIGHT_FUND_IS_PRIVATE_OFFSET: usize = 82;
const LIGHT_FUND_MEMBER_COUNT_OFFSET: usize = 83;
pub const LIGHT_FUND_HEADER_LEN: usize = 87;

const USER_OWNER_OFFSET: usize = 0;
const USER_FUND_COUNT_OFFSET: usize = 32;
pub const USER_HEADER_LEN: usize = 36;

pub const USER_ENTRY_V1_LEN: usize = 50;
const USER_V1_FUND_OFFSET: usize = 0;
const USER_V1_GOVERNANCE_BALANCE_OFFSET: usize = 32;
const USER_V1_PROPOSAL_COUNT_OFFSET: usize = 40;
const USER_V1_JOIN_TIMESTAMP_OFFSET: usize = 42;

pub const USER_ENTRY_V2_LEN: usize = 51;
const USER_V2_FUND_OFFSET: usize = 0;
const USER_V2_GOVERNANCE_BALANCE_OFFSET: usize = 32;
const USER_V2_PROPOSAL_COUNT_OFFSET: usize = 40;
const USER_V2_JOIN_TIMESTAMP_OFFSET: usize = 41;
const USER_V2_IS_PENDING_OFFSET: usize = 49;
const USER_V2_IS_ELIGIBLE_OFFSET: usize = 50;

/// Discriminates the two fund account layouts. The same byte is sent in deposit and
/// withdraw instructions so the program knows which layout to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FundType {
    Standard = 0,
    Light = 1,
}

impl FundType {
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Self::Standard),
            1 => Ok(Self::Light),
            _ => Err(CodecError::SchemaMismatch("unsupported fund type")),
        }
    }
}

/// How decoders treat derived addresses stored inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressCheck {
    /// Accept the stored bytes as-is.
    #[default]
    TrustStored,
    /// Recompute every derived address from its seeds and reject the record on any difference.
    Recompute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fund {
    pub name: String,
    pub expected_members: u32,
    pub creator_exists: bool,
    pub total_deposit: i64,
    pub governance_mint: Pubkey,
    pub vault: Pubkey,
    pub current_index: u8,
    pub created_at: i64,
    pub is_private: bool,
    pub members: Vec<Pubkey>,
}

impl Fund {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let name = layout::read_fixed_string(data, FUND_NAME_OFFSET, FUND_NAME_LEN)?;
        let expected_members = layout::read_u32(data, FUND_EXPECTED_MEMBERS_OFFSET)?;
        let creator_exists = layout::read_bool(data, FUND_CREATOR_EXISTS_OFFSET)?;
        let total_deposit = layout::read_i64(data, FUND_TOTAL_DEPOSIT_OFFSET)?;
        let governance_mint = layout::read_address(data, FUND_GOVERNANCE_MINT_OFFSET)?;
        let vault = layout::read_address(data, FUND_VAULT_OFFSET)?;
        let current_index = layout::read_u8(data, FUND_CURRENT_INDEX_OFFSET)?;
        let created_at = layout::read_i64(data, FUND_CREATED_AT_OFFSET)?;
        let is_private = layout::read_bool(data, FUND_IS_PRIVATE_OFFSET)?;
        let members = read_members(data, FUND_MEMBER_COUNT_OFFSET)?;

        debug!(%name, members = members.len(), "decoded fund account");
        Ok(Self {
            name,
            expected_members,
            creator_exists,
            total_deposit,
            governance_mint,
            vault,
            current_index,
            created_at,
            is_private,
            members,
        })
    }

    /// Decodes and checks the record against the address it was fetched from.
    ///
    /// The stored name must always derive `address`; this is what separates a standard fund
    /// from a light fund whose discriminator byte happens to collide. `Recompute` additionally
    /// checks the stored vault and governance mint.
    pub fn decode_checked(
        data: &[u8],
        address: &Pubkey,
        program_id: &Pubkey,
        check: AddressCheck,
    ) -> Result<Self, CodecError> {
        verify_name_seed(data, FUND_NAME_OFFSET, pda::FUND_SEED, address, program_id)?;
        let fund = Self::decode(data)?;
        if check == AddressCheck::Recompute {
            fund.verify_derived_accounts(address, program_id)?;
        }
        Ok(fund)
    }

    /// Recomputes the vault and governance-mint addresses of the fund at `address`.
    pub fn verify_derived_accounts(
        &self,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<(), CodecError> {
        let (vault, _) = pda::find_vault_address(address, program_id)?;
        if vault != self.vault {
            warn!(name = %self.name, "stored vault is not the derived vault");
            return Err(CodecError::SchemaMismatch("stored vault differs from the derived vault"));
        }
        let (mint, _) = pda::find_governance_mint_address(address, program_id)?;
        if mint != self.governance_mint {
            warn!(name = %self.name, "stored governance mint is not the derived mint");
            return Err(CodecError::SchemaMismatch(
                "stored governance mint differs from the derived mint",
            ));
        }
        Ok(())
    }

    /// The first member is the creator.
    pub fn creator(&self) -> Option<&Pubkey> {
        self.members.first()
    }

    pub fn encoded_len(&self) -> usize {
        FUND_HEADER_LEN + self.members.len() * PUBKEY_LEN
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data = vec![0u8; self.encoded_len()];
        layout::write_fixed_string(&mut data, FUND_NAME_OFFSET, FUND_NAME_LEN, &self.name)?;
        layout::write_u32(&mut data, FUND_EXPECTED_MEMBERS_OFFSET, self.expected_members)?;
        layout::write_bool(&mut data, FUND_CREATOR_EXISTS_OFFSET, self.creator_exists)?;
        layout::write_i64(&mut data, FUND_TOTAL_DEPOSIT_OFFSET, self.total_deposit)?;
        layout::write_address(&mut data, FUND_GOVERNANCE_MINT_OFFSET, &self.governance_mint)?;
        layout::write_address(&mut data, FUND_VAULT_OFFSET, &self.vault)?;
        layout::write_u8(&mut data, FUND_CURRENT_INDEX_OFFSET, self.current_index)?;
        layout::write_i64(&mut data, FUND_CREATED_AT_OFFSET, self.created_at)?;
        layout::write_bool(&mut data, FUND_IS_PRIVATE_OFFSET, self.is_private)?;
        write_members(&mut data, FUND_MEMBER_COUNT_OFFSET, &self.members)?;
        Ok(data)
    }
}

/// Light funds share the fund family but not its byte layout; see [`FundType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightFund {
    pub name: String,
    pub total_deposit: i64,
    pub vault: Pubkey,
    pub current_index: u8,
    pub created_at: i64,
    pub is_private: bool,
    pub members: Vec<Pubkey>,
}

impl LightFund {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        // Nothing else is read until the discriminator confirms the layout.
        let fund_type = layout::read_u8(data, LIGHT_FUND_TYPE_OFFSET)?;
        if FundType::from_u8(fund_type)? != FundType::Light {
            return Err(CodecError::SchemaMismatch("account is not a light fund"));
        }

        let name = layout::read_fixed_string(data, LIGHT_FUND_NAME_OFFSET, FUND_NAME_LEN)?;
        let total_deposit = layout::read_i64(data, LIGHT_FUND_TOTAL_DEPOSIT_OFFSET)?;
        let vault = layout::read_address(data, LIGHT_FUND_VAULT_OFFSET)?;
        let current_index = layout::read_u8(data, LIGHT_FUND_CURRENT_INDEX_OFFSET)?;
        let created_at = layout::read_i64(data, LIGHT_FUND_CREATED_AT_OFFSET)?;
        let is_private = layout::read_bool(data, LIGHT_FUND_IS_PRIVATE_OFFSET)?;
        let members = read_members(data, LIGHT_FUND_MEMBER_COUNT_OFFSET)?;

        debug!(%name, members = members.len(), "decoded light fund account");
        Ok(Self {
            name,
            total_deposit,
            vault,
            current_index,
            created_at,
            is_private,
            members,
        })
    }

    /// Same contract as [`Fund::decode_checked`], with the light-fund seed.
    pub fn decode_checked(
        data: &[u8],
        address: &Pubkey,
        program_id: &Pubkey,
        check: AddressCheck,
    ) -> Result<Self, CodecError> {
        verify_name_seed(data, LIGHT_FUND_NAME_OFFSET, pda::LIGHT_FUND_SEED, address, program_id)?;
        let fund = Self::decode(data)?;
        if check == AddressCheck::Recompute {
            fund.verify_derived_accounts(address, program_id)?;
        }
        Ok(fund)
    }

    pub fn verify_derived_accounts(
        &self,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<(), CodecError> {
        let (vault, _) = pda::find_vault_address(address, program_id)?;
        if vault != self.vault {
            warn!(name = %self.name, "stored vault is not the derived vault");
            return Err(CodecError::SchemaMismatch("stored vault differs from the derived vault"));
        }
        Ok(())
    }

    pub fn creator(&self) -> Option<&Pubkey> {
        self.members.first()
    }

    pub fn encoded_len(&self) -> usize {
        LIGHT_FUND_HEADER_LEN + self.members.len() * PUBKEY_LEN
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data = vec![0u8; self.encoded_len()];
        layout::write_fixed_string(&mut data, LIGHT_FUND_NAME_OFFSET, FUND_NAME_LEN, &self.name)?;
        layout::write_u8(&mut data, LIGHT_FUND_TYPE_OFFSET, FundType::Light as u8)?;
        layout::write_i64(&mut data, LIGHT_FUND_TOTAL_DEPOSIT_OFFSET, self.total_deposit)?;
        layout::write_address(&mut data, LIGHT_FUND_VAULT_OFFSET, &self.vault)?;
        layout::write_u8(&mut data, LIGHT_FUND_CURRENT_INDEX_OFFSET, self.current_index)?;
        layout::write_i64(&mut data, LIGHT_FUND_CREATED_AT_OFFSET, self.created_at)?;
        layout::write_bool(&mut data, LIGHT_FUND_IS_PRIVATE_OFFSET, self.is_private)?;
        write_members(&mut data, LIGHT_FUND_MEMBER_COUNT_OFFSET, &self.members)?;
        Ok(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundAccount {
    Standard(Fund),
    Light(LightFund),
}

impl FundAccount {
    pub fn decode(data: &[u8], fund_type: FundType) -> Result<Self, CodecError> {
        match fund_type {
            FundType::Standard => Fund::decode(data).map(Self::Standard),
            FundType::Light => LightFund::decode(data).map(Self::Light),
        }
    }

    pub fn fund_type(&self) -> FundType {
        match self {
            Self::Standard(_) => FundType::Standard,
            Self::Light(_) => FundType::Light,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Standard(fund) => &fund.name,
            Self::Light(fund) => &fund.name,
        }
    }

    pub fn current_index(&self) -> u8 {
        match self {
            Self::Standard(fund) => fund.current_index,
            Self::Light(fund) => fund.current_index,
        }
    }

    pub fn members(&self) -> &[Pubkey] {
        match self {
            Self::Standard(fund) => &fund.members,
            Self::Light(fund) => &fund.members,
        }
    }
}

/// Derives from the stored name bytes, not the decoded string, so a name that is not valid
/// UTF-8 still checks against the address it was written under.
fn verify_name_seed(
    data: &[u8],
    name_offset: usize,
    seed: &[u8],
    address: &Pubkey,
    program_id: &Pubkey,
) -> Result<(), CodecError> {
    let name = layout::read_fixed_string_bytes(data, name_offset, FUND_NAME_LEN)?;
    match pda::verify_address(address, &[seed, name], program_id) {
        Ok(_) => Ok(()),
        Err(CodecError::SchemaMismatch(_)) => {
            warn!(%address, "stored fund name does not derive the fetched address");
            Err(CodecError::SchemaMismatch("fund name does not derive the account address"))
        }
        Err(err) => Err(err),
    }
}

fn read_members(data: &[u8], count_offset: usize) -> Result<Vec<Pubkey>, CodecError> {
    let mut reader = layout::Reader::at(data, count_offset);
    reader.vec(PUBKEY_LEN, |r| r.address())
}

fn write_members(data: &mut [u8], count_offset: usize, members: &[Pubkey]) -> Result<(), CodecError> {
    let count = u32::try_from(members.len())
        .map_err(|_| CodecError::FieldOverflow("member count exceeds u32"))?;
    layout::write_u32(data, count_offset, count)?;
    for (i, member) in members.iter().enumerate() {
        layout::write_address(data, count_offset + 4 + i * PUBKEY_LEN, member)?;
    }
    Ok(())
}

/// Two per-fund entry layouts exist for user accounts; neither is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserLayout {
    /// 50-byte entries without pending/eligible flags.
    V1,
    /// 51-byte entries with a one-byte proposal count and both flags.
    V2,
}

impl UserLayout {
    pub const fn entry_len(self) -> usize {
        match self {
            Self::V1 => USER_ENTRY_V1_LEN,
            Self::V2 => USER_ENTRY_V2_LEN,
        }
    }
}

/// Layout assumed for accounts with no entries yet, i.e. right after `CreateUser`.
pub const EMPTY_USER_LAYOUT: UserLayout = UserLayout::V2;

/// Picks the entry layout whose stride exactly fills `data`.
///
/// An account with no entries has nothing to misread and gets [`EMPTY_USER_LAYOUT`]. Otherwise
/// fails with [`CodecError::SchemaMismatch`] when both or neither stride fit, since guessing
/// would silently shift every field of every entry.
pub fn detect_user_layout(data: &[u8]) -> Result<UserLayout, CodecError> {
    let count = layout::read_u32(data, USER_FUND_COUNT_OFFSET)? as usize;
    if count == 0 {
        return Ok(EMPTY_USER_LAYOUT);
    }
    let body = data.len() - USER_HEADER_LEN;
    let fits = |version: UserLayout| count.checked_mul(version.entry_len()) == Some(body);
    match (fits(UserLayout::V1), fits(UserLayout::V2)) {
        (true, false) => Ok(UserLayout::V1),
        (false, true) => Ok(UserLayout::V2),
        (true, true) => Err(CodecError::SchemaMismatch("user account layout is ambiguous")),
        (false, false) => Err(CodecError::SchemaMismatch(
            "user account length matches no known entry layout",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFundEntry {
    pub fund: Pubkey,
    pub governance_balance: i64,
    pub proposal_count: u16,
    pub join_timestamp: i64,
    /// Absent in [`UserLayout::V1`].
    pub is_pending: Option<bool>,
    /// Absent in [`UserLayout::V1`].
    pub is_eligible: Option<bool>,
}

impl UserFundEntry {
    fn decode(data: &[u8], base: usize, version: UserLayout) -> Result<Self, CodecError> {
        match version {
            UserLayout::V1 => Ok(Self {
                fund: layout::read_address(data, base + USER_V1_FUND_OFFSET)?,
                governance_balance: layout::read_i64(
                    data,
                    base + USER_V1_GOVERNANCE_BALANCE_OFFSET,
                )?,
                proposal_count: layout::read_u16(data, base + USER_V1_PROPOSAL_COUNT_OFFSET)?,
                join_timestamp: layout::read_i64(data, base + USER_V1_JOIN_TIMESTAMP_OFFSET)?,
                is_pending: None,
                is_eligible: None,
            }),
            UserLayout::V2 => Ok(Self {
                fund: layout::read_address(data, base + USER_V2_FUND_OFFSET)?,
                governance_balance: layout::read_i64(
                    data,
                    base + USER_V2_GOVERNANCE_BALANCE_OFFSET,
                )?,
                proposal_count: layout::read_u8(data, base + USER_V2_PROPOSAL_COUNT_OFFSET)?
                    .into(),
                join_timestamp: layout::read_i64(data, base + USER_V2_JOIN_TIMESTAMP_OFFSET)?,
                is_pending: Some(layout::read_bool(data, base + USER_V2_IS_PENDING_OFFSET)?),
                is_eligible: Some(layout::read_bool(data, base + USER_V2_IS_ELIGIBLE_OFFSET)?),
            }),
        }
    }

    fn encode(&self, data: &mut [u8], base: usize, version: UserLayout) -> Result<(), CodecError> {
        match version {
            UserLayout::V1 => {
                if self.is_pending.is_some() || self.is_eligible.is_some() {
                    return Err(CodecError::SchemaMismatch(
                        "V1 user entries carry no pending or eligible flags",
                    ));
                }
                layout::write_address(data, base + USER_V1_FUND_OFFSET, &self.fund)?;
                layout::write_i64(
                    data,
                    base + USER_V1_GOVERNANCE_BALANCE_OFFSET,
                    self.governance_balance,
                )?;
                layout::write_u16(data, base + USER_V1_PROPOSAL_COUNT_OFFSET, self.proposal_count)?;
                layout::write_i64(data, base + USER_V1_JOIN_TIMESTAMP_OFFSET, self.join_timestamp)
            }
            UserLayout::V2 => {
                let proposal_count = u8::try_from(self.proposal_count)
                    .map_err(|_| CodecError::FieldOverflow("V2 proposal count exceeds u8"))?;
                let (Some(is_pending), Some(is_eligible)) = (self.is_pending, self.is_eligible)
                else {
                    return Err(CodecError::SchemaMismatch(
                        "V2 user entries require pending and eligible flags",
                    ));
                };
                layout::write_address(data, base + USER_V2_FUND_OFFSET, &self.fund)?;
                layout::write_i64(
                    data,
                    base + USER_V2_GOVERNANCE_BALANCE_OFFSET,
                    self.governance_balance,
                )?;
                layout::write_u8(data, base + USER_V2_PROPOSAL_COUNT_OFFSET, proposal_count)?;
                layout::write_i64(data, base + USER_V2_JOIN_TIMESTAMP_OFFSET, self.join_timestamp)?;
                layout::write_bool(data, base + USER_V2_IS_PENDING_OFFSET, is_pending)?;
                layout::write_bool(data, base + USER_V2_IS_ELIGIBLE_OFFSET, is_eligible)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub owner: Pubkey,
    pub layout: UserLayout,
    pub funds: Vec<UserFundEntry>,
}

impl UserAccount {
    pub fn decode(data: &[u8], version: UserLayout) -> Result<Self, CodecError> {
        let owner = layout::read_address(data, USER_OWNER_OFFSET)?;
        let mut reader = layout::Reader::at(data, USER_FUND_COUNT_OFFSET);
        let count = reader.count(version.entry_len())?;
        let funds = (0..count)
            .map(|i| UserFundEntry::decode(data, USER_HEADER_LEN + i * version.entry_len(), version))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%owner, ?version, funds = funds.len(), "decoded user account");
        Ok(Self {
            owner,
            layout: version,
            funds,
        })
    }

    /// Decodes with the layout inferred by [`detect_user_layout`].
    pub fn decode_detected(data: &[u8]) -> Result<Self, CodecError> {
        let layout = detect_user_layout(data)?;
        Self::decode(data, layout)
    }

    pub fn entry_for(&self, fund: &Pubkey) -> Option<&UserFundEntry> {
        self.funds.iter().find(|entry| entry.fund == *fund)
    }

    pub fn encoded_len(&self) -> usize {
        USER_HEADER_LEN + self.funds.len() * self.layout.entry_len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data = vec![0u8; self.encoded_len()];
        let count = u32::try_from(self.funds.len())
            .map_err(|_| CodecError::FieldOverflow("fund count exceeds u32"))?;
        layout::write_address(&mut data, USER_OWNER_OFFSET, &self.owner)?;
        layout::write_u32(&mut data, USER_FUND_COUNT_OFFSET, count)?;
        for (i, entry) in self.funds.iter().enumerate() {
            entry.encode(
                &mut data,
                USER_HEADER_LEN + i * self.layout.entry_len(),
                self.layout,
            )?;
        }
        Ok(data)
    }
}

pub fn decode_fund(data: &[u8]) -> Result<Fund, CodecError> {
    Fund::decode(data)
}

pub fn decode_light_fund(data: &[u8]) -> Result<LightFund, CodecError> {
    LightFund::decode(data)
}

pub fn decode_fund_account(data: &[u8], fund_type: FundType) -> Result<FundAccount, CodecError> {
    FundAccount::decode(data, fund_type)
}

pub fn decode_user(data: &[u8], version: UserLayout) -> Result<UserAccount, CodecError> {
    UserAccount::decode(data, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    fn sample_fund() -> Fund {
        Fund {
            name: "MyFund".to_string(),
            expected_members: 3,
            creator_exists: true,
            total_deposit: 2_500_000_000,
            governance_mint: key(2),
            vault: key(3),
            current_index: 4,
            created_at: 1_700_000_000,
            is_private: true,
            members: vec![key(10), key(11)],
        }
    }

    #[test]
    fn fund_fields_sit_at_their_offsets() {
        let data = sample_fund().encode().unwrap();
        assert_eq!(data.len(), FUND_HEADER_LEN + 64);
        assert_eq!(&data[..6], b"MyFund");
        assert!(data[6..32].iter().all(|b| *b == 0));
        assert_eq!(data[32..36], 3u32.to_le_bytes());
        assert_eq!(data[36], 1);
        assert_eq!(data[37..45], 2_500_000_000i64.to_le_bytes());
        assert_eq!(data[45..77], [2u8; 32]);
        assert_eq!(data[77..109], [3u8; 32]);
        assert_eq!(data[109], 4);
        assert_eq!(data[110..118], 1_700_000_000i64.to_le_bytes());
        assert_eq!(data[118], 1);
        assert_eq!(data[119..123], 2u32.to_le_bytes());
        assert_eq!(data[123..155], [10u8; 32]);
    }

    #[test]
    fn decodes_fund_and_creator() {
        let fund = Fund::decode(&sample_fund().encode().unwrap()).unwrap();
        assert_eq!(fund, sample_fund());
        assert_eq!(fund.creator(), Some(&key(10)));
    }

    #[test]
    fn fund_with_missing_member_is_truncated() {
        let data = sample_fund().encode().unwrap();
        let err = Fund::decode(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));
    }

    #[test]
    fn fund_trailing_capacity_is_ignored() {
        let mut data = sample_fund().encode().unwrap();
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(Fund::decode(&data).unwrap(), sample_fund());
    }

    #[test]
    fn overlong_fund_name_is_rejected_on_encode() {
        let mut fund = sample_fund();
        fund.name = "n".repeat(33);
        assert!(matches!(fund.encode(), Err(CodecError::FieldOverflow(_))));
    }

    #[test]
    fn recompute_mode_cross_checks_derived_addresses() {
        let program_id = crate::id();
        let (address, _) = pda::find_fund_address("MyFund", &program_id).unwrap();
        let mut fund = sample_fund();
        fund.vault = pda::find_vault_address(&address, &program_id).unwrap().0;
        fund.governance_mint = pda::find_governance_mint_address(&address, &program_id)
            .unwrap()
            .0;
        let data = fund.encode().unwrap();

        Fund::decode_checked(&data, &address, &program_id, AddressCheck::Recompute).unwrap();

        let stored = sample_fund().encode().unwrap();
        assert!(matches!(
            Fund::decode_checked(&stored, &address, &program_id, AddressCheck::Recompute),
            Err(CodecError::SchemaMismatch(_))
        ));
        Fund::decode_checked(&stored, &address, &program_id, AddressCheck::TrustStored).unwrap();
    }

    fn sample_light_fund() -> LightFund {
        LightFund {
            name: "Lite".to_string(),
            total_deposit: 42,
            vault: key(5),
            current_index: 1,
            created_at: 1_650_000_000,
            is_private: false,
            members: vec![key(20)],
        }
    }

    #[test]
    fn light_fund_uses_its_own_offsets() {
        let data = sample_light_fund().encode().unwrap();
        assert_eq!(data.len(), LIGHT_FUND_HEADER_LEN + 32);
        assert_eq!(data[32], FundType::Light as u8);
        assert_eq!(data[33..41], 42i64.to_le_bytes());
        assert_eq!(data[41..73], [5u8; 32]);
        assert_eq!(data[73], 1);
        assert_eq!(LightFund::decode(&data).unwrap(), sample_light_fund());
    }

    #[test]
    fn light_fund_decoder_rejects_other_discriminators() {
        let mut data = sample_light_fund().encode().unwrap();
        data[32] = FundType::Standard as u8;
        assert_eq!(
            LightFund::decode(&data),
            Err(CodecError::SchemaMismatch("account is not a light fund"))
        );
        data[32] = 9;
        assert_eq!(
            LightFund::decode(&data),
            Err(CodecError::SchemaMismatch("unsupported fund type"))
        );
    }

    #[test]
    fn fund_account_dispatches_on_fund_type() {
        let data = sample_light_fund().encode().unwrap();
        let account = decode_fund_account(&data, FundType::Light).unwrap();
        assert_eq!(account.fund_type(), FundType::Light);
        assert_eq!(account.name(), "Lite");
        assert_eq!(account.members(), &[key(20)]);
    }

    fn v1_user() -> UserAccount {
        UserAccount {
            owner: key(1),
            layout: UserLayout::V1,
            funds: vec![
                UserFundEntry {
                    fund: key(2),
                    governance_balance: 1_000,
                    proposal_count: 300,
                    join_timestamp: 1_700_000_001,
                    is_pending: None,
                    is_eligible: None,
                },
                UserFundEntry {
                    fund: key(3),
                    governance_balance: -1,
                    proposal_count: 0,
                    join_timestamp: 1_700_000_002,
                    is_pending: None,
                    is_eligible: None,
                },
            ],
        }
    }

    fn v2_user() -> UserAccount {
        UserAccount {
            owner: key(1),
            layout: UserLayout::V2,
            funds: vec![UserFundEntry {
                fund: key(4),
                governance_balance: 77,
                proposal_count: 5,
                join_timestamp: 1_700_000_003,
                is_pending: Some(true),
                is_eligible: Some(false),
            }],
        }
    }

    #[test]
    fn user_v1_entries_are_fifty_bytes() {
        let data = v1_user().encode().unwrap();
        assert_eq!(data.len(), USER_HEADER_LEN + 2 * 50);
        assert_eq!(data[36 + 50..36 + 82], [3u8; 32]);
        assert_eq!(UserAccount::decode(&data, UserLayout::V1).unwrap(), v1_user());
    }

    #[test]
    fn user_v2_entries_are_fifty_one_bytes() {
        let data = v2_user().encode().unwrap();
        assert_eq!(data.len(), USER_HEADER_LEN + 51);
        assert_eq!(data[36 + 40], 5);
        assert_eq!(data[36 + 49], 1);
        assert_eq!(data[36 + 50], 0);
        assert_eq!(UserAccount::decode(&data, UserLayout::V2).unwrap(), v2_user());
    }

    #[test]
    fn user_layout_detection_refuses_to_guess() {
        assert_eq!(
            detect_user_layout(&v1_user().encode().unwrap()),
            Ok(UserLayout::V1)
        );
        assert_eq!(
            detect_user_layout(&v2_user().encode().unwrap()),
            Ok(UserLayout::V2)
        );
        let mut padded = v2_user().encode().unwrap();
        padded.push(0);
        assert!(UserAccount::decode_detected(&padded).is_err());
    }

    #[test]
    fn user_layout_writers_refuse_lossy_entries() {
        let mut user = v2_user();
        user.layout = UserLayout::V1;
        assert!(matches!(user.encode(), Err(CodecError::SchemaMismatch(_))));

        let mut user = v2_user();
        user.funds[0].proposal_count = 256;
        assert!(matches!(user.encode(), Err(CodecError::FieldOverflow(_))));
    }

    #[test]
    fn user_with_fewer_entries_than_declared_is_truncated() {
        let data = v1_user().encode().unwrap();
        assert!(matches!(
            UserAccount::decode(&data[..data.len() - 50], UserLayout::V1),
            Err(CodecError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn fresh_user_account_decodes_without_a_layout_hint() {
        let fresh = UserAccount {
            owner: key(1),
            layout: UserLayout::V1,
            funds: Vec::new(),
        };
        let data = fresh.encode().unwrap();
        assert_eq!(data.len(), USER_HEADER_LEN);

        let decoded = UserAccount::decode_detected(&data).unwrap();
        assert_eq!(decoded.owner, key(1));
        assert!(decoded.funds.is_empty());
        assert_eq!(decoded.layout, EMPTY_USER_LAYOUT);

        let mut with_capacity = data.clone();
        with_capacity.extend_from_slice(&[0u8; 100]);
        assert!(UserAccount::decode_detected(&with_capacity).unwrap().funds.is_empty());
    }

    #[test]
    fn standard_fund_is_not_accepted_as_a_light_fund() {
        let program_id = crate::id();
        let mut fund = sample_fund();
        fund.expected_members = 257;
        fund.vault = Pubkey::default();
        fund.members.clear();
        let data = fund.encode().unwrap();
        // The low byte of expected_members collides with the light discriminator.
        assert_eq!(data[LIGHT_FUND_TYPE_OFFSET], FundType::Light as u8);
        assert!(LightFund::decode(&data).is_ok());

        let (standard, _) = pda::find_fund_address("MyFund", &program_id).unwrap();
        assert_eq!(
            LightFund::decode_checked(&data, &standard, &program_id, AddressCheck::TrustStored),
            Err(CodecError::SchemaMismatch("fund name does not derive the account address"))
        );
        assert!(
            Fund::decode_checked(&data, &standard, &program_id, AddressCheck::TrustStored).is_ok()
        );
    }

    #[test]
    fn fund_name_must_derive_the_fetched_address() {
        let program_id = crate::id();
        let (other, _) = pda::find_fund_address("OtherFund", &program_id).unwrap();
        let data = sample_fund().encode().unwrap();
        assert_eq!(
            Fund::decode_checked(&data, &other, &program_id, AddressCheck::TrustStored),
            Err(CodecError::SchemaMismatch("fund name does not derive the account address"))
        );
    }

    #[test]
    fn name_seed_uses_stored_bytes_even_when_not_utf8() {
        let program_id = crate::id();
        let raw_name = [b'f', 0xFF, b'x'];
        let (address, _) = pda::derive_address(&[pda::FUND_SEED, &raw_name], &program_id).unwrap();
        let mut data = sample_fund().encode().unwrap();
        data[..FUND_NAME_LEN].fill(0);
        data[..3].copy_from_slice(&raw_name);

        let fund =
            Fund::decode_checked(&data, &address, &program_id, AddressCheck::TrustStored).unwrap();
        assert_eq!(fund.name, "f\\xffx");
    }
}
