use std::collections::BTreeSet;

use borsh::BorshSerialize;
use fund_codec::{
    amount::parse_ui_amount,
    instruction::{self, FundInstruction},
    layout,
    pda,
    proposal::{JoinProposal, Proposal, Voter, JOIN_AGGREGATOR_HEADER_LEN, JOIN_PROPOSAL_LEN},
    state::UserFundEntry,
    tags, CodecError, Fund, FundType, JoinProposalAggregator, LightFund, ProposalAggregator,
    UserAccount, UserLayout, VoteAccount,
};
use proptest::prelude::*;
use solana_program::pubkey::Pubkey;

fn key(byte: u8) -> Pubkey {
    Pubkey::new_from_array([byte; 32])
}

fn sample_aggregator() -> ProposalAggregator {
    let proposal = |vector_index: u16, swaps: usize| Proposal {
        proposer: key(vector_index as u8 + 1),
        from_assets: (0..swaps).map(|i| key(0x10 + i as u8)).collect(),
        to_assets: (0..swaps).map(|i| key(0x20 + i as u8)).collect(),
        amounts: (0..swaps).map(|i| 1_000_000_000 * (i as i64 + 1)).collect(),
        slippages: (0..swaps).map(|i| 50 + i as u16).collect(),
        votes_yes: 3,
        votes_no: 1,
        creation_time: 1_700_000_000,
        deadline: 1_700_086_400,
        executed: false,
        vector_index,
    };
    ProposalAggregator {
        fund: key(0xAA),
        index: 4,
        proposals: vec![proposal(0, 2), proposal(1, 0), proposal(2, 3)],
    }
}

#[test]
fn create_fund_alpha_private() {
    assert_eq!(
        instruction::encode_create_fund("Alpha", true).unwrap(),
        vec![0, 1, 0x41, 0x6C, 0x70, 0x68, 0x61]
    );
}

#[test]
fn join_aggregator_with_trailing_capacity() {
    let mut data = vec![0u8; JOIN_AGGREGATOR_HEADER_LEN + 2 * JOIN_PROPOSAL_LEN + 200];
    data[..32].copy_from_slice(key(7).as_ref());
    data[32..36].copy_from_slice(&2u32.to_le_bytes());
    for i in 0..2 {
        let base = JOIN_AGGREGATOR_HEADER_LEN + i * JOIN_PROPOSAL_LEN;
        data[base..base + 32].copy_from_slice(key(0x40 + i as u8).as_ref());
        data[base + 32..base + 40].copy_from_slice(&(i as i64 + 1).to_le_bytes());
        data[base + 56] = i as u8;
    }

    let aggregator = JoinProposalAggregator::decode(&data).unwrap();
    assert_eq!(aggregator.fund, key(7));
    assert_eq!(aggregator.proposals.len(), 2);
    assert_eq!(aggregator.proposals[1].joiner, key(0x41));
    assert_eq!(aggregator.proposals[1].votes_yes, 2);
    assert_eq!(aggregator.proposal(1).map(|p| p.joiner), Some(key(0x41)));
}

#[test]
fn deposit_amounts_scale_by_token_decimals() {
    assert_eq!(parse_ui_amount("1.5", 6), Ok(1_500_000));
    assert_eq!(parse_ui_amount("1", 9), Ok(1_000_000_000));
    assert_eq!(parse_ui_amount("1.9999999", 6), Ok(1_999_999));

    let data = instruction::encode_deposit("Fund", FundType::Standard, "1.5", 6, 0).unwrap();
    match FundInstruction::unpack(&data).unwrap() {
        FundInstruction::Deposit { amount, .. } => assert_eq!(amount, 1_500_000),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn tags_three_and_seven() {
    let mask = tags::encode_tags([3, 7], 0).unwrap();
    assert_eq!(tags::decode_tags(mask), BTreeSet::from([3, 7]));
}

#[test]
fn fixed_string_stops_at_first_nul() {
    let mut region = [0u8; 32];
    region[..6].copy_from_slice(b"MyFund");
    assert_eq!(layout::read_fixed_string(&region, 0, 32).unwrap(), "MyFund");
}

#[test]
fn aggregator_decoder_consumes_exactly_the_packed_bytes() {
    let aggregator = sample_aggregator();
    let data = aggregator.try_to_vec().unwrap();
    let (decoded, consumed) = ProposalAggregator::decode_with_len(&data).unwrap();
    assert_eq!(decoded, aggregator);
    assert_eq!(consumed, data.len());
}

#[test]
fn derivation_is_deterministic() {
    let program = fund_codec::id();
    let first = pda::find_vote_address(2, 513, &key(1), &program).unwrap();
    let second = pda::find_vote_address(2, 513, &key(1), &program).unwrap();
    assert_eq!(first, second);
}

#[test]
fn payload_lengths_follow_the_field_widths() {
    let name = "Growth";
    let cases: Vec<(Vec<u8>, usize)> = vec![
        (instruction::encode_create_fund(name, false).unwrap(), 1 + 1),
        (
            instruction::encode_create_proposal(name, &["1", "2.5"], &[10, 20], 99).unwrap(),
            1 + 1 + 2 * 8 + 2 * 2 + 8,
        ),
        (instruction::encode_vote_proposal(name, true, 1, 2).unwrap(), 1 + 1 + 1 + 2),
        (instruction::encode_join_fund(name).unwrap(), 1),
        (instruction::encode_execute_proposal(name, 1, 2).unwrap(), 1 + 1 + 2),
        (
            instruction::encode_deposit(name, FundType::Light, "3", 6, 1).unwrap(),
            1 + 1 + 8 + 8,
        ),
        (instruction::encode_withdraw(name, FundType::Standard, 40).unwrap(), 1 + 1 + 1),
        (instruction::encode_create_join_proposal(name).unwrap(), 1),
        (instruction::encode_vote_join_proposal(name, false, 3).unwrap(), 1 + 1 + 1),
        (instruction::encode_delete_join_proposal(name, 3).unwrap(), 1 + 1),
        (instruction::encode_cancel_proposal(name, 1, 2).unwrap(), 1 + 1 + 2),
        (instruction::encode_create_light_fund(name, true).unwrap(), 1 + 1),
    ];
    for (data, fixed) in cases {
        assert_eq!(data.len(), fixed + name.len(), "opcode {}", data[0]);
        assert!(data.ends_with(name.as_bytes()));
    }
    assert_eq!(instruction::encode_create_user().unwrap(), vec![6]);
}

fn assert_every_prefix_truncated<T: std::fmt::Debug>(
    schema: &str,
    data: &[u8],
    decode: impl Fn(&[u8]) -> Result<T, CodecError>,
) {
    assert!(decode(data).is_ok(), "{schema}: full buffer must decode");
    for cut in 0..data.len() {
        let result = decode(&data[..cut]);
        assert!(
            matches!(result, Err(CodecError::TruncatedBuffer { .. })),
            "{schema}: prefix of {cut} bytes gave {result:?}"
        );
    }
}

fn user_entry(fund: u8, flags: Option<(bool, bool)>) -> UserFundEntry {
    UserFundEntry {
        fund: key(fund),
        governance_balance: 1_000,
        proposal_count: 3,
        join_timestamp: 1_700_000_000,
        is_pending: flags.map(|(pending, _)| pending),
        is_eligible: flags.map(|(_, eligible)| eligible),
    }
}

#[test]
fn fund_prefixes_are_truncated() {
    let fund = Fund {
        name: "MyFund".to_string(),
        expected_members: 4,
        creator_exists: true,
        total_deposit: 9,
        governance_mint: key(2),
        vault: key(3),
        current_index: 1,
        created_at: 1_700_000_000,
        is_private: false,
        members: vec![key(10), key(11), key(12)],
    };
    assert_every_prefix_truncated("fund", &fund.encode().unwrap(), Fund::decode);
}

#[test]
fn light_fund_prefixes_are_truncated() {
    let fund = LightFund {
        name: "Lite".to_string(),
        total_deposit: 9,
        vault: key(3),
        current_index: 0,
        created_at: 1_700_000_000,
        is_private: true,
        members: vec![key(10), key(11)],
    };
    assert_every_prefix_truncated("light fund", &fund.encode().unwrap(), LightFund::decode);
}

#[test]
fn user_prefixes_are_truncated_in_both_layouts() {
    let v1 = UserAccount {
        owner: key(1),
        layout: UserLayout::V1,
        funds: vec![user_entry(5, None), user_entry(6, None)],
    };
    assert_every_prefix_truncated("user v1", &v1.encode().unwrap(), |data| {
        UserAccount::decode(data, UserLayout::V1)
    });

    let v2 = UserAccount {
        owner: key(1),
        layout: UserLayout::V2,
        funds: vec![user_entry(5, Some((true, false))), user_entry(6, Some((false, true)))],
    };
    assert_every_prefix_truncated("user v2", &v2.encode().unwrap(), |data| {
        UserAccount::decode(data, UserLayout::V2)
    });
}

#[test]
fn join_aggregator_prefixes_are_truncated() {
    let aggregator = JoinProposalAggregator {
        fund: key(7),
        proposals: (0..3)
            .map(|i| JoinProposal {
                joiner: key(0x40 + i),
                votes_yes: i as i64,
                votes_no: 1,
                creation_time: 1_700_000_000,
                proposal_index: i,
            })
            .collect(),
    };
    assert_every_prefix_truncated(
        "join aggregator",
        &aggregator.try_to_vec().unwrap(),
        JoinProposalAggregator::decode,
    );
}

#[test]
fn vote_account_prefixes_are_truncated() {
    let account = VoteAccount {
        tag: 0,
        voters: vec![
            Voter {
                voter: key(1),
                vote: true,
            },
            Voter {
                voter: key(2),
                vote: false,
            },
        ],
    };
    assert_every_prefix_truncated(
        "vote account",
        &account.try_to_vec().unwrap(),
        VoteAccount::decode,
    );
}

#[test]
fn proposal_aggregator_prefixes_are_truncated() {
    let data = sample_aggregator().try_to_vec().unwrap();
    assert_every_prefix_truncated("proposal aggregator", &data, ProposalAggregator::decode);
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = ProposalAggregator::decode(&data);
        let _ = JoinProposalAggregator::decode(&data);
        let _ = fund_codec::proposal::decode_vote_account(&data);
        let _ = fund_codec::state::decode_fund(&data);
        let _ = fund_codec::state::decode_light_fund(&data);
        let _ = fund_codec::UserAccount::decode_detected(&data);
        let _ = FundInstruction::unpack(&data);
    }
}
