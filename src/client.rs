//! Read path: fetch raw account bytes through an [`AccountFetcher`] and decode them.

use std::sync::Arc;

use solana_program::pubkey::Pubkey;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    debounce::Debouncer,
    errors::{ClientError, CodecError},
    instruction, pda,
    proposal::{JoinProposalAggregator, ProposalAggregator, VoteAccount},
    state::{Fund, FundAccount, FundType, LightFund, UserAccount, UserLayout},
    transaction::{AccountFetcher, InstructionBuilder},
};

pub struct FundClient<F> {
    fetcher: Arc<F>,
    config: ClientConfig,
}

impl<F> Clone for FundClient<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            config: self.config,
        }
    }
}

impl<F> FundClient<F>
where
    F: AccountFetcher + 'static,
{
    pub fn new(fetcher: F, config: ClientConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.config.program_id
    }

    pub fn instructions(&self) -> InstructionBuilder {
        InstructionBuilder::new(self.config.program_id)
    }

    async fn fetch_required(&self, address: &Pubkey) -> Result<Vec<u8>, ClientError> {
        self.fetcher
            .get_account_data(address)
            .await?
            .ok_or_else(|| ClientError::AccountNotFound(address.to_string()))
    }

    pub async fn fetch_fund(&self, name: &str) -> Result<Fund, ClientError> {
        let (address, _) = pda::find_fund_address(name, self.program_id())?;
        let data = self.fetch_required(&address).await?;
        Ok(Fund::decode_checked(
            &data,
            &address,
            self.program_id(),
            self.config.address_check,
        )?)
    }

    pub async fn fetch_light_fund(&self, name: &str) -> Result<LightFund, ClientError> {
        let (address, _) = pda::find_light_fund_address(name, self.program_id())?;
        let data = self.fetch_required(&address).await?;
        Ok(LightFund::decode_checked(
            &data,
            &address,
            self.program_id(),
            self.config.address_check,
        )?)
    }

    pub async fn fetch_fund_account(
        &self,
        name: &str,
        fund_type: FundType,
    ) -> Result<FundAccount, ClientError> {
        match fund_type {
            FundType::Standard => self.fetch_fund(name).await.map(FundAccount::Standard),
            FundType::Light => self.fetch_light_fund(name).await.map(FundAccount::Light),
        }
    }

    /// `Ok(None)` when the wallet has not created its user account yet.
    pub async fn fetch_user(
        &self,
        wallet: &Pubkey,
        version: Option<UserLayout>,
    ) -> Result<Option<UserAccount>, ClientError> {
        let (address, _) = pda::find_user_address(wallet, self.program_id())?;
        let Some(data) = self.fetcher.get_account_data(&address).await? else {
            return Ok(None);
        };
        let user = match version {
            Some(version) => UserAccount::decode(&data, version)?,
            None => UserAccount::decode_detected(&data)?,
        };
        if user.owner != *wallet {
            warn!(%wallet, owner = %user.owner, "user account owned by another wallet");
            return Err(
                CodecError::SchemaMismatch("user account owner differs from the wallet").into(),
            );
        }
        Ok(Some(user))
    }

    /// Fetches the aggregator of the fund's current generation and checks it belongs there.
    pub async fn fetch_proposal_aggregator(
        &self,
        fund_address: &Pubkey,
        current_index: u8,
    ) -> Result<ProposalAggregator, ClientError> {
        let (address, _) =
            pda::find_proposal_aggregator_address(current_index, fund_address, self.program_id())?;
        let data = self.fetch_required(&address).await?;
        Ok(ProposalAggregator::decode_for_fund(
            &data,
            fund_address,
            current_index,
        )?)
    }

    pub async fn fetch_join_proposal_aggregator(
        &self,
        fund_address: &Pubkey,
    ) -> Result<JoinProposalAggregator, ClientError> {
        let (address, _) =
            pda::find_join_proposal_aggregator_address(fund_address, self.program_id())?;
        let data = self.fetch_required(&address).await?;
        Ok(JoinProposalAggregator::decode_for_fund(&data, fund_address)?)
    }

    /// `Ok(None)` until the first vote is cast.
    pub async fn fetch_vote_account(
        &self,
        fund_address: &Pubkey,
        proposal_index: u8,
        vector_index: u16,
    ) -> Result<Option<VoteAccount>, ClientError> {
        let (address, _) =
            pda::find_vote_address(proposal_index, vector_index, fund_address, self.program_id())?;
        match self.fetcher.get_account_data(&address).await? {
            Some(data) => Ok(Some(VoteAccount::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Fetches every member's user account concurrently. Members without a user account are
    /// skipped; the result keeps the order of `members`.
    pub async fn fetch_members(
        &self,
        members: &[Pubkey],
    ) -> Result<Vec<(Pubkey, UserAccount)>, ClientError> {
        let mut tasks = JoinSet::new();
        for (position, wallet) in members.iter().copied().enumerate() {
            let (address, _) = pda::find_user_address(&wallet, self.program_id())?;
            let fetcher = Arc::clone(&self.fetcher);
            tasks.spawn(async move {
                let data = fetcher.get_account_data(&address).await?;
                let user = data
                    .map(|data| UserAccount::decode_detected(&data))
                    .transpose()?;
                Ok::<_, ClientError>((position, wallet, user))
            });
        }

        let mut found = Vec::with_capacity(members.len());
        while let Some(joined) = tasks.join_next().await {
            let (position, wallet, user) =
                joined.map_err(|err| ClientError::Fetch(err.to_string()))??;
            if let Some(user) = user {
                found.push((position, wallet, user));
            }
        }
        found.sort_by_key(|(position, _, _)| *position);
        debug!(requested = members.len(), found = found.len(), "fetched member accounts");
        Ok(found
            .into_iter()
            .map(|(_, wallet, user)| (wallet, user))
            .collect())
    }

    /// A name is available when it is a valid fund name and no standard fund is stored
    /// under its derived address.
    pub async fn is_fund_name_available(&self, name: &str) -> Result<bool, ClientError> {
        instruction::validate_fund_name(name)?;
        let (address, _) = pda::find_fund_address(name, self.program_id())?;
        let taken = self.fetcher.get_account_data(&address).await?.is_some();
        debug!(name, taken, "checked fund name");
        Ok(!taken)
    }

    /// A debouncer using the configured name-check quiet period.
    pub fn name_check_debouncer(&self) -> Debouncer {
        Debouncer::new(self.config.name_check_debounce)
    }

    /// Queues an availability check on `debouncer`; only the last name scheduled before the
    /// quiet period ends is checked and reported to `on_result`.
    pub fn schedule_name_check<C>(&self, debouncer: &mut Debouncer, name: String, on_result: C)
    where
        C: FnOnce(String, Result<bool, ClientError>) + Send + 'static,
    {
        let client = self.clone();
        debouncer.schedule(async move {
            let available = client.is_fund_name_available(&name).await;
            on_result(name, available);
        });
    }
}
