//! Command tests against the simulated card

mod common;

use bytes::Bytes;
use common::{RecordingObserver, ScriptedTransport, SimulatedCard};
use k256::ecdsa::VerifyingKey;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use tangem_apdu_core::prelude::*;
use tangem_card::crypto::{self, WalletKey};
use tangem_card::{
    BatchSubstitutions, CardStatus, EvmCoinEngine, Error, IssuerKeys, PendingIssuerData,
    SessionConfig, Setting, SignOptions, SigningMethod, StaticIssuerDirectory, SwapPinOutcome,
    Tangem, VerifyCodeRequest,
};

const SIGN: u8 = 0xFB;

fn verify_prehash(key: &WalletKey, hash: &[u8], signature: &[u8; 64]) -> bool {
    let key = VerifyingKey::from_sec1_bytes(&key.uncompressed).unwrap();
    let signature = k256::ecdsa::Signature::from_slice(signature).unwrap();
    key.verify_prehash(hash, &signature).is_ok()
}

fn issuer_records(balance: u32) -> Vec<u8> {
    TlvList::from(vec![
        Tlv::u32(TlvTag::ValidatedBalance, balance),
        Tlv::u16(TlvTag::Denomination, 100),
        Tlv::ascii(TlvTag::DenominationText, "100 ETH"),
    ])
    .encode()
    .unwrap()
    .to_vec()
}

#[test]
fn test_read_loaded_card() {
    common::init_tracing();
    let simulated = SimulatedCard::loaded();
    let wallet = simulated.wallet_public().unwrap();

    let mut card = Tangem::new(simulated).with_coin_engine(EvmCoinEngine::default());
    let state = card.read().unwrap();

    assert_eq!(state.card_id.as_deref(), Some("CB22000000027374"));
    assert_eq!(state.status, Some(CardStatus::Loaded));
    assert_eq!(state.manufacturer_id.as_deref(), Some("TANGEM"));
    assert_eq!(state.firmware.as_ref().unwrap().to_string(), "2.30");
    assert_eq!(state.card_data.blockchain_id.as_deref(), Some("ETH"));
    assert_eq!(state.card_data.batch.as_deref(), Some("0017"));
    assert_eq!(state.curve_id.as_deref(), Some("secp256k1"));
    assert_eq!(state.wallet_public_key, Some(wallet));
    assert_eq!(state.remaining_signatures, Some(1000));
    assert_eq!(
        state.wallet_address.as_deref(),
        Some(EvmCoinEngine::checksum_address(&wallet).as_str())
    );
    // No issuer data on the card
    assert!(state.issuer_data.is_none());
    assert!(state.offline_balance.is_none());
}

#[test]
fn test_read_applies_substitution() {
    let mut card = Tangem::new(SimulatedCard::loaded()).with_substitutions(BatchSubstitutions::historic());
    let state = card.read().unwrap();
    assert_eq!(
        state.card_data.token_contract_address.as_deref(),
        Some("0x9Eef75bA8e81340da9D8d1fd06B2f313DB88839c")
    );
}

#[test]
fn test_read_empty_card_has_no_wallet() {
    let mut card = Tangem::new(SimulatedCard::empty()).with_coin_engine(EvmCoinEngine::default());
    let state = card.read().unwrap();
    assert_eq!(state.status, Some(CardStatus::Empty));
    assert!(state.wallet_public_key.is_none());
    assert!(state.wallet_address.is_none());
}

#[test]
fn test_verify_card() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    assert!(matches!(card.verify_card(), Err(Error::ReadRequired)));

    card.read().unwrap();
    assert!(card.verify_card().unwrap());
    assert_eq!(card.state().card_public_key_valid, Some(true));
    assert_eq!(card.state().manufacturer_confirmed, Some(true));
}

#[test]
fn test_verify_card_with_forged_signature() {
    let mut simulated = SimulatedCard::loaded();
    simulated.forge_card_signature = true;

    let mut card = Tangem::new(simulated);
    card.read().unwrap();

    assert!(!card.verify_card().unwrap());
    assert_eq!(card.state().card_public_key_valid, Some(false));
    assert_eq!(card.state().manufacturer_confirmed, Some(false));
}

#[test]
fn test_check_wallet() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    card.read().unwrap();
    assert!(card.check_wallet().unwrap());
    assert_eq!(card.state().wallet_public_key_valid, Some(true));

    let mut card = Tangem::new(SimulatedCard::empty());
    card.read().unwrap();
    assert!(matches!(card.check_wallet(), Err(Error::InvalidState(_))));
}

#[test]
fn test_sign_hashes() {
    let observer = RecordingObserver::new();
    let mut simulated = SimulatedCard::loaded();
    simulated.pause_rounds = 2;
    let wallet = simulated.wallet_public().unwrap();

    let mut card = Tangem::new(simulated).with_observer(observer.clone());
    card.read().unwrap();

    let hashes = [[0xA1u8; 32], [0xB2u8; 32], [0xC3u8; 32]];
    let signatures = card.sign(&hashes).unwrap();

    assert_eq!(signatures.len(), 3);
    for (hash, signature) in hashes.iter().zip(&signatures) {
        assert!(verify_prehash(&wallet, hash, signature));
    }
    assert_eq!(card.state().remaining_signatures, Some(997));
    assert_eq!(card.state().signed_hashes, Some(3));
    assert_eq!(observer.delays().len(), 2);
    assert_eq!(card.state().use_default_pin2, Some(true));
}

#[test]
fn test_sign_rejects_bad_batches_before_sending() {
    let mut card = Tangem::new(ScriptedTransport::new());

    assert!(matches!(
        card.sign(&[[7u8; 32]; 11]),
        Err(Error::InvalidHashes(_))
    ));

    let mut mixed = vec![vec![7u8; 32]; 9];
    mixed.push(vec![7u8; 20]);
    assert!(matches!(card.sign(&mixed), Err(Error::InvalidHashes(_))));

    assert!(matches!(
        card.sign::<[u8; 32]>(&[]),
        Err(Error::InvalidHashes(_))
    ));
    assert!(card.transport().commands.is_empty());
}

#[test]
fn test_sign_requires_issuer_validation() {
    let simulated = SimulatedCard::loaded()
        .with_signing_methods(&[SigningMethod::SignHashValidatedByIssuer]);
    let issuer_key = simulated.issuer_transaction_key.clone();

    let mut card = Tangem::new(simulated);
    card.read().unwrap();

    assert!(matches!(
        card.sign(&[[1u8; 32]]),
        Err(Error::SigningMethodNotAllowed(_))
    ));
    assert!(!card.transport().log.contains(&SIGN));

    let options = SignOptions::default().with_issuer_transaction_key(issuer_key);
    let response = card.sign_with(&[[1u8; 32]], &options).unwrap();
    assert_eq!(response.signatures.len(), 1);
    assert_eq!(response.remaining_signatures, Some(999));
}

#[test]
fn test_sign_with_issuer_data() {
    let simulated = SimulatedCard::loaded()
        .with_signing_methods(&[SigningMethod::SignHashValidatedByIssuerAndWriteIssuerData]);
    let options = SignOptions::default()
        .with_issuer_transaction_key(simulated.issuer_transaction_key.clone())
        .with_issuer_data(issuer_records(5), simulated.issuer_data_key.clone());

    let mut card = Tangem::new(simulated);
    card.read().unwrap();
    card.sign_with(&[[3u8; 32]], &options).unwrap();

    assert_eq!(card.transport().issuer_data, issuer_records(5));
    let stored = card.state().issuer_data.as_ref().unwrap();
    assert_eq!(stored.data.as_ref(), &issuer_records(5)[..]);
}

#[test]
fn test_sign_raw() {
    let simulated = SimulatedCard::loaded();
    let wallet = simulated.wallet_public().unwrap();

    let mut card = Tangem::new(simulated);
    card.read().unwrap();

    let raw = b"raw transaction bytes";
    let response = card.sign_raw(raw, &SignOptions::default()).unwrap();
    assert!(crypto::verify(&wallet.uncompressed, raw, &response.signatures[0]));

    let too_long = vec![0u8; 1025];
    assert!(matches!(
        card.sign_raw(&too_long, &SignOptions::default()),
        Err(Error::InvalidHashes(_))
    ));
}

#[test]
fn test_sign_with_terminal_key() {
    let terminal = common::key(42);
    let config = SessionConfig::default().with_terminal_key(terminal);

    let mut card = Tangem::with_config(SimulatedCard::loaded(), config);
    card.read().unwrap();
    assert_eq!(card.sign(&[[9u8; 32]]).unwrap().len(), 1);
}

#[test]
fn test_wallet_lifecycle() {
    let mut card = Tangem::new(SimulatedCard::empty()).with_coin_engine(EvmCoinEngine::default());
    card.read().unwrap();

    assert!(matches!(card.purge_wallet(), Err(Error::InvalidState(_))));

    card.create_wallet().unwrap();
    let wallet = card.transport().wallet_public().unwrap();
    assert_eq!(card.state().status, Some(CardStatus::Loaded));
    assert_eq!(card.state().wallet_public_key, Some(wallet));
    assert_eq!(
        card.state().wallet_address.as_deref(),
        Some(EvmCoinEngine::checksum_address(&wallet).as_str())
    );
    assert!(matches!(card.create_wallet(), Err(Error::InvalidState(_))));

    card.purge_wallet().unwrap();
    assert_eq!(card.state().status, Some(CardStatus::Empty));
    assert!(card.state().wallet_public_key.is_none());
    assert!(card.state().wallet_address.is_none());
}

#[test]
fn test_purge_forbidden_by_settings() {
    let simulated = SimulatedCard::loaded().with_settings(&[Setting::ForbidPurgeWallet]);
    let mut card = Tangem::new(simulated);
    card.read().unwrap();
    assert!(matches!(card.purge_wallet(), Err(Error::InvalidState(_))));
}

#[test]
fn test_wrong_pin2() {
    let mut card = Tangem::new(SimulatedCard::empty());
    card.read().unwrap();

    card.set_pin2("999");
    assert!(matches!(card.create_wallet(), Err(Error::InvalidPin)));
    assert_eq!(card.state().status, Some(CardStatus::Empty));
}

#[test]
fn test_swap_pin_outcomes() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    card.read().unwrap();

    assert_eq!(
        card.swap_pin("000000", "000", false).unwrap(),
        SwapPinOutcome::PinsNotChanged
    );
    assert_eq!(
        card.swap_pin("000000", "4321", false).unwrap(),
        SwapPinOutcome::Pin2Changed
    );
    assert_eq!(card.state().use_default_pin2, Some(false));

    assert_eq!(
        card.swap_pin("654321", "000", false).unwrap(),
        SwapPinOutcome::PinsChanged
    );
    assert_eq!(card.state().use_default_pin2, Some(true));

    // Commands keep working with the new PIN
    card.read().unwrap();
}

#[test]
fn test_check_pin2_is_default() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    card.read().unwrap();
    assert_eq!(card.check_pin2_is_default().unwrap(), Some(true));

    let mut simulated = SimulatedCard::loaded();
    simulated.pin2_hash = crypto::pin_hash("2468");
    let mut card = Tangem::new(simulated);
    card.read().unwrap();
    assert_eq!(card.check_pin2_is_default().unwrap(), Some(false));
    assert_eq!(card.state().use_default_pin2, Some(false));

    let mut simulated = SimulatedCard::loaded();
    simulated.firmware = "1.10".to_string();
    let mut card = Tangem::new(simulated);
    card.read().unwrap();
    assert_eq!(card.check_pin2_is_default().unwrap(), None);
}

#[test]
fn test_validate_and_verify_code() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    card.read().unwrap();

    let validation = card.validate_card().unwrap();
    assert_eq!(validation.counter, Some(1));
    assert!(validation.signature.is_some());

    let challenge = Bytes::from_static(&[0x5A; 16]);
    let hash = card
        .verify_code(&VerifyCodeRequest {
            hash_alg: "sha-256".into(),
            code_page_address: 0x0800_0000,
            code_page_count: 4,
            challenge: challenge.clone(),
        })
        .unwrap();
    assert_eq!(hash.as_ref(), &crypto::sha256(&challenge)[..]);
}

#[test]
fn test_read_verifies_issuer_data() {
    let simulated = SimulatedCard::loaded().with_issuer_data(&issuer_records(250), None);
    let mut card = Tangem::new(simulated);
    let state = card.read().unwrap();

    assert_eq!(state.offline_balance.as_deref(), Some(&250u32.to_be_bytes()[..]));
    assert_eq!(state.denomination.as_deref(), Some(&100u16.to_be_bytes()[..]));
    assert_eq!(state.denomination_text.as_deref(), Some("100 ETH"));
}

#[test]
fn test_read_survives_invalid_issuer_data() {
    let mut simulated = SimulatedCard::loaded().with_issuer_data(&issuer_records(250), None);
    simulated.issuer_data_signature[10] ^= 0xFF;

    let mut card = Tangem::new(simulated);
    let state = card.read().unwrap();
    assert_eq!(state.status, Some(CardStatus::Loaded));
    assert!(state.offline_balance.is_none());
    assert!(state.denomination.is_none());

    assert!(matches!(
        card.get_issuer_data(),
        Err(Error::InvalidIssuerData(_))
    ));
}

#[test]
fn test_issuer_data_with_replay_counter() {
    let simulated = SimulatedCard::loaded()
        .with_settings(&[Setting::ProtectIssuerDataAgainstReplay])
        .with_issuer_data(&issuer_records(1), Some(5));
    let issuer_key = simulated.issuer_data_key.clone();

    let mut card = Tangem::new(simulated);
    card.read().unwrap();
    assert_eq!(card.state().issuer_data.as_ref().unwrap().counter, Some(5));

    card.write_issuer_data_signed(Bytes::from(issuer_records(2)), &issuer_key)
        .unwrap();
    assert_eq!(card.transport().issuer_data_counter, Some(6));

    let records = card.get_issuer_data().unwrap().unwrap();
    assert_eq!(records.validated_balance.as_deref(), Some(&2u32.to_be_bytes()[..]));
}

#[test]
fn test_pending_issuer_data_written_on_read() {
    let simulated = SimulatedCard::loaded();
    let data = issuer_records(77);
    let signature = tangem_card::sign_issuer_data(
        &simulated.issuer_data_key,
        &simulated.card_id,
        &data,
        None,
    )
    .unwrap();

    let mut card = Tangem::new(simulated);
    card.schedule_issuer_data_write(PendingIssuerData {
        card_id: "CB22000000027374".into(),
        data: Bytes::from(data.clone()),
        signature: Bytes::copy_from_slice(&signature),
        counter: None,
    });

    let state = card.read().unwrap();
    assert_eq!(state.offline_balance.as_deref(), Some(&77u32.to_be_bytes()[..]));
    assert!(card.pending_issuer_data().is_none());
    assert_eq!(card.transport().issuer_data, data);
}

#[test]
fn test_pending_issuer_data_kept_for_other_card() {
    let mut card = Tangem::new(SimulatedCard::loaded());
    card.schedule_issuer_data_write(PendingIssuerData {
        card_id: "0000000000000001".into(),
        data: Bytes::from_static(b"x"),
        signature: Bytes::from_static(&[0; 64]),
        counter: None,
    });
    card.read().unwrap();
    assert!(card.pending_issuer_data().is_some());
}

#[test]
fn test_extra_issuer_data() {
    let observer = RecordingObserver::new();
    let simulated =
        SimulatedCard::loaded().with_settings(&[Setting::ProtectIssuerDataAgainstReplay]);
    let issuer_key = simulated.issuer_data_key.clone();
    let data: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();

    let mut card = Tangem::new(simulated).with_observer(observer.clone());
    card.read().unwrap();
    assert_eq!(card.get_issuer_data_ex().unwrap(), None);

    card.write_issuer_data_ex(&data, &issuer_key).unwrap();
    assert_eq!(card.transport().issuer_data_ex, data);
    assert_eq!(card.transport().issuer_data_ex_counter, Some(1));

    let progress = observer.progress();
    assert!(progress.contains(&10));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1] || pair[1] == 10));

    let read = card.get_issuer_data_ex().unwrap().unwrap();
    assert_eq!(read.as_ref(), &data[..]);
}

#[test]
fn test_issuer_directory_fills_missing_keys() {
    let keys = IssuerKeys {
        data_key: Bytes::from_static(&[0x04; 65]),
        transaction_key: Bytes::from_static(&[0x04; 65]),
    };
    let transport = ScriptedTransport::new()
        .respond(
            vec![
                Tlv::new(TlvTag::CardId, common::CARD_ID.to_vec()),
                Tlv::u8(TlvTag::Status, CardStatus::Empty.code()),
                Tlv::new(TlvTag::CardPublicKey, common::public(&common::key(1))),
                Tlv::new(
                    TlvTag::CardData,
                    TlvList::from(vec![Tlv::ascii(TlvTag::IssuerId, "ACME")])
                        .encode()
                        .unwrap(),
                ),
            ],
            Status::ProcessCompleted,
        )
        .respond(vec![], Status::InvalidState);

    let mut card = Tangem::new(transport)
        .with_issuer_directory(StaticIssuerDirectory::new().with_issuer("ACME", keys.clone()));
    let state = card.read().unwrap();
    assert_eq!(state.issuer_data_public_key, Some(keys.data_key));
    assert_eq!(state.issuer_transaction_public_key, Some(keys.transaction_key));
}
