use rdp_trace::{
    PacketKind, RdpCommand, TraceReadError, TraceReader, TraceWriter, ViRegister, TRACE_MAGIC,
    VI_NUM_REG,
};
use rdp_trace_replay::{
    replay, replay_file, CommandStats, RdramAllocError, ReplayConfig, ReplayError, ReplayState,
    MAX_RDRAM_SIZE,
};
use std::io::Cursor;

fn vi_regs(origin: u32, width: u32) -> [u32; VI_NUM_REG] {
    let mut regs = [0u32; VI_NUM_REG];
    regs[ViRegister::Status.index()] = 0x0000_320E;
    regs[ViRegister::Origin.index()] = origin;
    regs[ViRegister::Width.index()] = width;
    regs
}

fn two_frame_trace() -> Vec<u8> {
    let mut w = TraceWriter::new(Vec::new(), 0x1000).unwrap();
    w.write_rdram(0x10, &[0xAAAA_AAAA, 0xBBBB_BBBB]).unwrap();
    w.write_command(&[0x3f10_013f, 0x0010_0000]).unwrap(); // SET_COLOR_IMAGE
    w.write_command(&[0x3700_0000, 0xffff_ffff]).unwrap(); // SET_FILL_COLOR
    w.write_vi(&vi_regs(0x100, 320)).unwrap();
    w.write_rdram(0x20, &[1]).unwrap();
    w.write_command(&[0x2900_0000, 0]).unwrap(); // SYNC_FULL
    w.write_vi(&vi_regs(0x200, 640)).unwrap();
    w.finish().unwrap()
}

fn run(
    bytes: Vec<u8>,
    config: ReplayConfig,
) -> (Result<ReplayState, ReplayError>, Vec<RdpCommand>) {
    let mut commands = Vec::new();
    let mut sink = |c: &RdpCommand| commands.push(*c);
    let mut reader = TraceReader::new(Cursor::new(bytes));
    let res = replay(&mut reader, &mut sink, config);
    (res, commands)
}

#[test]
fn replays_all_packets_in_order() {
    let (res, commands) = run(two_frame_trace(), ReplayConfig::default());
    let state = res.unwrap();

    let words: Vec<&[u32]> = commands.iter().map(|c| c.words()).collect();
    assert_eq!(
        words,
        vec![
            &[0x3f10_013f, 0x0010_0000][..],
            &[0x3700_0000, 0xffff_ffff][..],
            &[0x2900_0000, 0][..],
        ]
    );

    let summary = &state.summary;
    assert_eq!(summary.rdram_size, 0x1000);
    assert_eq!(summary.commands, 3);
    assert_eq!(summary.patches, 2);
    assert_eq!(summary.words_patched, 3);
    assert_eq!(summary.frames, 2);
    assert!(!summary.stopped_early);

    assert_eq!(state.rdram.read_word(0x10), Some(0xAAAA_AAAA));
    assert_eq!(state.rdram.read_word(0x11), Some(0xBBBB_BBBB));
    assert_eq!(state.rdram.read_word(0x20), Some(1));
    assert_eq!(state.rdram.read_word(0x12), Some(0));
    assert_eq!(state.vi.as_array(), &vi_regs(0x200, 640));

    let digests = &summary.frame_digests;
    assert_eq!(digests.len(), 2);
    assert_eq!((digests[0].frame_index, digests[0].origin, digests[0].width), (0, 0x100, 320));
    assert_eq!((digests[1].frame_index, digests[1].origin, digests[1].width), (1, 0x200, 640));
    // RDRAM changed between the two frames.
    assert_ne!(digests[0].sha256, digests[1].sha256);
    assert_eq!(digests[0].sha256_hex().len(), 64);
}

#[test]
fn frame_digests_are_deterministic() {
    let (a, _) = run(two_frame_trace(), ReplayConfig::default());
    let (b, _) = run(two_frame_trace(), ReplayConfig::default());
    assert_eq!(a.unwrap().summary, b.unwrap().summary);
}

#[test]
fn max_frames_stops_before_eof() {
    let config = ReplayConfig {
        max_frames: Some(1),
        hash_frames: false,
    };
    let (res, commands) = run(two_frame_trace(), config);
    let state = res.unwrap();
    assert_eq!(state.summary.frames, 1);
    assert!(state.summary.stopped_early);
    assert!(state.summary.frame_digests.is_empty());
    assert_eq!(commands.len(), 2);
    assert_eq!(state.rdram.read_word(0x20), Some(0));
}

#[test]
fn zero_max_frames_stops_at_the_first_vi_packet() {
    let config = ReplayConfig {
        max_frames: Some(0),
        hash_frames: true,
    };
    let (res, commands) = run(two_frame_trace(), config);
    let state = res.unwrap();
    assert_eq!(state.summary.frames, 0);
    assert!(state.summary.stopped_early);
    assert!(state.summary.frame_digests.is_empty());
    assert_eq!(commands.len(), 2);
    assert_eq!(state.vi.as_array(), &[0u32; VI_NUM_REG]);
}

#[test]
fn oversized_rdram_header_is_rejected_before_allocating() {
    // 13 bytes claiming a 1 GiB image.
    let mut bytes = TRACE_MAGIC.to_vec();
    bytes.extend_from_slice(&(1u64 << 30).to_le_bytes());
    bytes.push(PacketKind::Eof.as_u8());

    let (res, commands) = run(bytes, ReplayConfig::default());
    let err = res.unwrap_err();
    assert!(matches!(
        err,
        ReplayError::Rdram(RdramAllocError::TooLarge {
            size: 0x4000_0000,
            max: MAX_RDRAM_SIZE,
        })
    ));
    assert!(err.to_string().contains(&MAX_RDRAM_SIZE.to_string()));
    assert!(commands.is_empty());
}

#[test]
fn single_command_scenario() {
    let mut bytes = TRACE_MAGIC.to_vec();
    bytes.extend_from_slice(&0x1000u64.to_le_bytes());
    bytes.push(PacketKind::Command.as_u8());
    bytes.push(2);
    bytes.extend_from_slice(&0xAABB_CCDDu32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.push(PacketKind::Eof.as_u8());

    let (res, commands) = run(bytes, ReplayConfig::default());
    let state = res.unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].words(), &[0xAABB_CCDD, 1]);
    assert_eq!(state.summary.frames, 0);
}

#[test]
fn bad_tag_aborts_replay_with_offset() {
    let mut bytes = TraceWriter::new(Vec::new(), 0x100)
        .unwrap()
        .finish()
        .unwrap();
    // Replace the EOF tag with garbage.
    *bytes.last_mut().unwrap() = 0x7F;

    let (res, _) = run(bytes, ReplayConfig::default());
    assert!(matches!(
        res.unwrap_err(),
        ReplayError::Trace(TraceReadError::UnknownPacketKind {
            value: 0x7F,
            offset: 12
        })
    ));
}

#[test]
fn replay_file_counts_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_frames.rdptrace");
    std::fs::write(&path, two_frame_trace()).unwrap();

    let mut stats = CommandStats::default();
    let summary = replay_file(
        &path,
        |c: &RdpCommand| stats.record(c),
        ReplayConfig::default(),
    )
    .unwrap();
    assert_eq!(summary.commands, 3);
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.count(0x3f), 1);
    assert_eq!(stats.count(0x37), 1);
    assert_eq!(stats.count(0x29), 1);
}

#[test]
fn replay_file_reports_missing_trace() {
    let dir = tempfile::tempdir().unwrap();
    let err = replay_file(
        dir.path().join("nope.rdptrace"),
        CommandStats::default(),
        ReplayConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReplayError::Trace(TraceReadError::Open { .. })));
}
