//! Pose streams over reliable and lossy receivers.

use bitstream::{BitReader, BitWriter};
use codec::{PoseConfig, PoseDecoder, PoseEncoder, PoseWrite};
use schema::{Pose, Quat, Vec3};
use wire::Tick;

fn path(tick: u32) -> Pose {
    #[allow(clippy::cast_precision_loss)]
    let t = tick as f32 * 0.1;
    Pose::new(
        Vec3::new(t * 3.0, (t * 0.5).sin() * 2.0, -t),
        Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), t * 0.2),
    )
}

fn write(encoder: &PoseEncoder, mode: PoseWrite, config: &PoseConfig) -> Vec<u8> {
    let mut writer = BitWriter::new();
    encoder.write(&mut writer, mode, config).unwrap();
    writer.finish()
}

fn read(decoder: &mut PoseDecoder, bytes: &[u8], config: &PoseConfig) -> Pose {
    let mut reader = BitReader::new(bytes);
    let pose = decoder.read(&mut reader, config).unwrap();
    assert!(reader.is_empty());
    pose
}

fn assert_tracks(actual: Pose, expected: Pose) {
    // Half a fixed-point step per axis plus standard rotation error.
    assert!(actual.position.distance_sq(expected.position) <= 3.0 * 0.05 * 0.05 + 1e-4);
    assert!(actual.rotation.angle_to(expected.rotation).to_degrees() < 1.0);
}

#[test]
fn reliable_receiver_tracks_every_tick() {
    let config = PoseConfig::for_testing();
    let mut encoder = PoseEncoder::with_phase(0);
    let mut decoder = PoseDecoder::new();
    let mut keyframes = 0;
    for tick in 1..=120 {
        encoder.plan(Tick::new(tick), path(tick), &config);
        if encoder.plans_keyframe() {
            keyframes += 1;
        }
        let bytes = write(&encoder, PoseWrite::Planned, &config);
        assert_tracks(read(&mut decoder, &bytes, &config), path(tick));
        encoder.commit(true);
    }
    assert!(keyframes >= 4, "schedule keyframes: {keyframes}");
}

#[test]
fn lossy_receiver_recovers_with_catch_up() {
    let config = PoseConfig::for_testing();
    let mut encoder = PoseEncoder::with_phase(0);
    let mut decoder = PoseDecoder::new();
    let mut held_generation = None;

    for tick in 1..=120u32 {
        encoder.plan(Tick::new(tick), path(tick), &config);
        let mode = if encoder.plans_keyframe() || held_generation == Some(encoder.generation()) {
            PoseWrite::Planned
        } else {
            PoseWrite::CatchUp
        };
        let bytes = write(&encoder, mode, &config);
        let dropped = tick % 4 == 0;
        if !dropped {
            assert_tracks(read(&mut decoder, &bytes, &config), path(tick));
            held_generation = Some(encoder.planned_generation());
        }
        encoder.commit(true);
    }
}

#[test]
fn owner_stream_is_always_absolute() {
    let config = PoseConfig::for_testing();
    let mut encoder = PoseEncoder::with_phase(0);
    for tick in 1..=10 {
        encoder.plan(Tick::new(tick), path(tick), &config);
        let bytes = write(&encoder, PoseWrite::Owner, &config);
        let pose = read(&mut PoseDecoder::new(), &bytes, &config);
        assert!(pose.rotation.angle_to(path(tick).rotation).to_degrees() < 0.05);
        encoder.commit(false);
    }
    assert_eq!(encoder.generation(), 0);
}
