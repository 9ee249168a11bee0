mod common;

use bitstream::BitWriter;
use common::{patient_config, schema, Client, SHIP};
use runtime::{Authority, Channel, Disposal, PeerId, RuntimeConfig, RuntimeError, Tick};
use schema::{Value, ValueContext};
use wire::{encode_input_entry, encode_input_header, InputHeader, LocalId};

#[test]
fn silent_peer_times_out_and_owned_entities_despawn() {
    // 10 ticks per second, 2 second window.
    let mut auth = Authority::new(schema(), RuntimeConfig::for_testing()).unwrap();
    let mut quiet = Client::join(&mut auth, 1);
    let mut steady = Client::join(&mut auth, 2);
    let owned = auth.spawn(SHIP).unwrap();
    let shared = auth.spawn(SHIP).unwrap();
    auth.set_owner(owned, Some(quiet.id)).unwrap();

    let mut timed_out_at = None;
    for t in 1..=40u32 {
        if t == 10 {
            auth.set(owned, 1, Value::I32(55)).unwrap();
        }
        let report = auth.tick();
        if t == 10 {
            quiet.deliver(&report, false);
            assert_eq!(quiet.value(&auth, owned, 1), Some(Value::I32(55)));
        } else if t < 10 {
            quiet.sync(&mut auth, &report);
        }
        steady.sync(&mut auth, &report);

        if !report.timed_out.is_empty() {
            assert_eq!(report.timed_out, vec![quiet.id]);
            assert_eq!(report.disposed, vec![owned]);
            assert!(report.messages_for(quiet.id, Channel::TickState).next().is_none());
            timed_out_at = Some(report.tick);
            break;
        }
    }

    // Last ack at tick 9, window of 20 ticks.
    assert_eq!(timed_out_at, Some(Tick::new(30)));
    assert!(auth.peer(quiet.id).is_none());
    assert!(!auth.arena().contains(owned));
    assert!(auth.arena().contains(shared));

    let report = auth.tick();
    steady.sync(&mut auth, &report);
    assert_eq!(steady.observer.entities().count(), 1);
    assert_eq!(steady.hooks.released.len(), 1);
}

#[test]
fn timeout_with_release_policy_keeps_entities() {
    let config = RuntimeConfig::for_testing().with_disposal(Disposal::ReleaseOwnership);
    let mut auth = Authority::new(schema(), config).unwrap();
    let quiet = Client::join(&mut auth, 1);
    let owned = auth.spawn(SHIP).unwrap();
    auth.set_owner(owned, Some(quiet.id)).unwrap();

    let timeout = auth.config().timeout_ticks();
    let mut reports = Vec::new();
    for _ in 0..=timeout {
        reports.push(auth.tick());
    }
    let last = reports.last().unwrap();
    assert_eq!(last.timed_out, vec![quiet.id]);
    assert!(last.disposed.is_empty());
    assert_eq!(auth.arena().get(owned).unwrap().owner(), None);
}

#[test]
fn owner_input_is_applied_and_replicated() {
    let mut auth = Authority::new(schema(), patient_config()).unwrap();
    let mut pilot = Client::join(&mut auth, 1);
    let mut watcher = Client::join(&mut auth, 2);
    let ship = auth.spawn(SHIP).unwrap();
    auth.set_owner(ship, Some(pilot.id)).unwrap();
    let report = auth.tick();
    pilot.sync(&mut auth, &report);
    watcher.sync(&mut auth, &report);

    let local = pilot.local(&auth, ship).unwrap();
    pilot.observer.set_local(local, 3, Value::F32(0.75)).unwrap();
    let input = pilot.observer.build_input(Tick::new(1)).unwrap().unwrap();
    assert_eq!(auth.receive_input(pilot.id, &input).unwrap(), 1);
    assert_eq!(auth.get(ship, 3).unwrap(), &Value::F32(0.75));
    // Replayed input is stale.
    assert_eq!(auth.receive_input(pilot.id, &input).unwrap(), 0);

    let report = auth.tick();
    pilot.sync(&mut auth, &report);
    watcher.sync(&mut auth, &report);
    assert_eq!(watcher.value(&auth, ship, 3), Some(Value::F32(0.75)));
}

#[test]
fn input_for_unowned_entity_is_ignored() {
    let mut auth = Authority::new(schema(), patient_config()).unwrap();
    let mut pilot = Client::join(&mut auth, 1);
    let mut intruder = Client::join(&mut auth, 2);
    let ship = auth.spawn(SHIP).unwrap();
    auth.set_owner(ship, Some(pilot.id)).unwrap();
    let report = auth.tick();
    pilot.sync(&mut auth, &report);
    intruder.sync(&mut auth, &report);

    let local = intruder.local(&auth, ship).unwrap();
    assert_eq!(
        intruder.observer.set_local(local, 3, Value::F32(1.0)),
        Err(RuntimeError::NotOwned { local })
    );

    // Hand-built input naming the pilot's ship.
    let schema = auth.shared_schema();
    let ty = schema.entity_type(SHIP).unwrap();
    let ctx = ValueContext::new(schema.serializers(), auth.config().value_limits());
    let mut values = ty.default_values();
    values[3] = Value::F32(1.0);
    let mut writer = BitWriter::new();
    encode_input_header(
        &mut writer,
        &InputHeader {
            tick: Tick::new(1),
            count: 1,
        },
    )
    .unwrap();
    encode_input_entry(&mut writer, local, 0b1000).unwrap();
    codec::encode_properties_plain(&mut writer, &ctx, ty, 0b1000, &values).unwrap();
    let forged = writer.finish();

    assert_eq!(auth.receive_input(intruder.id, &forged).unwrap(), 0);
    assert_eq!(auth.get(ship, 3).unwrap(), &Value::F32(0.0));
}

#[test]
fn input_naming_unknown_local_id_is_rejected() {
    let mut auth = Authority::new(schema(), patient_config()).unwrap();
    let pilot = Client::join(&mut auth, 1);
    let mut writer = BitWriter::new();
    encode_input_header(
        &mut writer,
        &InputHeader {
            tick: Tick::new(1),
            count: 1,
        },
    )
    .unwrap();
    encode_input_entry(&mut writer, LocalId::new(7).unwrap(), 0).unwrap();
    let bytes = writer.finish();

    assert!(matches!(
        auth.receive_input(pilot.id, &bytes),
        Err(RuntimeError::UnknownLocal { .. })
    ));
    assert!(auth.receive_input(PeerId(9), &bytes).is_err());
}
