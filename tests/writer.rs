use std::fs::File;
use std::io::{Read as IoRead, Seek, SeekFrom};
use std::path::Path;

use tempfile::tempdir;

use pod5::fileformat::container::{
    check_file_signature, check_section_marker, parse_footer, FileFooter,
};
use pod5::fileformat::frame::{read_frame, FrameKind};
use pod5::fileformat::signal_table::SignalBatch;
use pod5::fileformat::table::{decode_batch, read_schema, TableKind};
use pod5::fileformat::{FileWriterOptions, PoreData, ReadSignal, Writer};
use pod5::simulate::ReadSimulator;


fn read_footer(path: &Path) -> FileFooter {
    let mut file = File::open(path).unwrap();
    parse_footer(&mut file).unwrap()
}

/// Every stored signal row, as (chunk bytes, declared sample count)
fn collect_signal_chunks(path: &Path) -> Vec<(Vec<u8>, u32)> {
    let mut file = File::open(path).unwrap();
    let footer = parse_footer(&mut file).unwrap();
    file.seek(SeekFrom::Start(footer.signal.offset)).unwrap();
    let mut section = file.by_ref().take(footer.signal.length);

    let schema = read_schema(&mut section).unwrap();
    assert_eq!(schema.table, TableKind::Signal);

    let mut rows = Vec::new();
    loop {
        let (kind, payload) = read_frame(&mut section).unwrap();
        match kind {
            FrameKind::Batch => {
                let batch: SignalBatch = decode_batch(&payload).unwrap();
                for (chunk, count) in batch.chunks.into_iter().zip(batch.sample_counts) {
                    rows.push((chunk, count));
                }
            }
            FrameKind::End => break,
            other => panic!("unexpected {:?} frame in the signal section", other),
        }
    }
    rows
}


#[test]
fn test_writer_accepts_small_batches_of_reads() {
    let dir = tempdir().unwrap();
    for n in 1..=4 {
        let path = dir.path().join(format!("batch_{}.pod5", n));
        let mut sim = ReadSimulator::new(n as u64);
        let mut writer = Writer::create(&path).unwrap();

        for _ in 0..n {
            writer.add_read(sim.next_read(1500)).unwrap();
        }
        assert_eq!(writer.reads_written(), n as u64);
        writer.close().unwrap();

        let footer = read_footer(&path);
        assert_eq!(footer.reads.summary.row_count, n as u64);
        assert_eq!(footer.signal.summary.row_count, n as u64);
    }
}

#[test]
fn test_add_reads_takes_a_whole_batch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("batch_api.pod5");

    let mut sim = ReadSimulator::new(2);
    let reads: Vec<_> = (0..5).map(|_| sim.next_read(700)).collect();

    let mut writer = Writer::create(&path).unwrap();
    writer.add_reads(reads).unwrap();
    writer.close().unwrap();

    assert_eq!(read_footer(&path).reads.summary.row_count, 5);
}

#[test]
fn test_pre_compressed_signal_is_stored_byte_for_byte() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("precompressed.pod5");

    let mut sim = ReadSimulator::new(21);
    let read = sim.next_read_pre_compressed(3000, 1000).unwrap();
    let submitted: Vec<Vec<u8>> = match &read.signal {
        ReadSignal::Compressed { chunks, .. } => chunks.clone(),
        ReadSignal::Raw(_) => unreachable!(),
    };

    let mut writer = Writer::create(&path).unwrap();
    writer.add_read(read).unwrap();
    writer.close().unwrap();

    let stored = collect_signal_chunks(&path);
    assert_eq!(stored.len(), 3);
    for (submitted_chunk, (stored_chunk, sample_count)) in submitted.iter().zip(&stored) {
        assert_eq!(submitted_chunk, stored_chunk);
        assert_eq!(*sample_count, 1000);
    }
}

#[test]
#[allow(deprecated)]
fn test_add_read_object_behaves_like_add_read() {
    let dir = tempdir().unwrap();
    let path_a = dir.path().join("via_add_read.pod5");
    let path_b = dir.path().join("via_alias.pod5");

    // Two identical simulated runs, stored through the two entry points
    let mut sim_a = ReadSimulator::new(11);
    let mut sim_b = ReadSimulator::new(11);
    let mut writer_a = Writer::create(&path_a).unwrap();
    let mut writer_b = Writer::create(&path_b).unwrap();

    for _ in 0..3 {
        writer_a.add_read(sim_a.next_read(1500)).unwrap();
        writer_b.add_read_object(sim_b.next_read(1500)).unwrap();
    }
    writer_a
        .add_read(sim_a.next_read_pre_compressed(1800, 600).unwrap())
        .unwrap();
    writer_b
        .add_read_object(sim_b.next_read_pre_compressed(1800, 600).unwrap())
        .unwrap();

    // Only the alias leaves notices, one per call, whichever form
    assert_eq!(writer_a.deprecation_notices(), 0);
    assert_eq!(writer_b.deprecation_notices(), 4);

    writer_a.close().unwrap();
    writer_b.close().unwrap();

    assert_eq!(collect_signal_chunks(&path_a), collect_signal_chunks(&path_b));

    let footer_a = read_footer(&path_a);
    let footer_b = read_footer(&path_b);
    assert_eq!(
        footer_a.reads.summary.row_count,
        footer_b.reads.summary.row_count
    );
    assert_eq!(
        footer_a.signal.summary.byte_count,
        footer_b.signal.summary.byte_count
    );
}

#[test]
#[allow(deprecated)]
fn test_every_alias_call_leaves_a_notice() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notices.pod5");

    let mut sim = ReadSimulator::new(31);
    let mut writer = Writer::create(&path).unwrap();
    assert_eq!(writer.deprecation_notices(), 0);

    writer.add_read_object(sim.next_read(500)).unwrap();
    writer.add_read_object(sim.next_read(500)).unwrap();
    assert_eq!(writer.deprecation_notices(), 2);

    // The current entry point leaves none
    writer.add_read(sim.next_read(500)).unwrap();
    assert_eq!(writer.deprecation_notices(), 2);

    writer.add_read_object(sim.next_read(500)).unwrap();
    assert_eq!(writer.deprecation_notices(), 3);

    // Pre-compressed reads count the same way
    writer
        .add_read_object(sim.next_read_pre_compressed(600, 300).unwrap())
        .unwrap();
    assert_eq!(writer.deprecation_notices(), 4);
    writer.close().unwrap();
}

#[test]
fn test_writer_exposes_its_file_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("handle.pod5");

    let mut writer = Writer::create(&path).unwrap();
    assert!(!writer.file_writer().is_closed());
    let file_identifier = *writer.file_writer().file_identifier();

    // The handle gives row level control, here a dictionary entry added
    // before any read references it
    let pore = PoreData {
        channel: 12,
        well: 1,
        pore_type: "not_set".to_string(),
    };
    assert_eq!(writer.file_writer_mut().add_pore(&pore).unwrap(), 0);
    assert_eq!(writer.file_writer_mut().add_pore(&pore).unwrap(), 0);

    writer.close().unwrap();
    assert!(writer.file_writer().is_closed());

    let footer = read_footer(&path);
    assert_eq!(footer.info.file_identifier, file_identifier);
}

#[test]
fn test_a_mixed_run_of_four_reads_roundtrips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.pod5");

    let mut options = FileWriterOptions::default();
    options.max_signal_chunk_size = 1000;
    let mut sim = ReadSimulator::new(77);
    let mut writer = Writer::create_with_options(&path, options).unwrap();

    // Two raw reads, chunked by the writer: 3 rows + 1 row
    writer.add_read(sim.next_read(2500)).unwrap();
    writer.add_read(sim.next_read(800)).unwrap();
    // Two pre-compressed reads of two chunks each: 4 rows
    writer
        .add_read(sim.next_read_pre_compressed(2000, 1000).unwrap())
        .unwrap();
    writer
        .add_read(sim.next_read_pre_compressed(1200, 1000).unwrap())
        .unwrap();
    writer.close().unwrap();

    let footer = read_footer(&path);
    assert_eq!(footer.reads.summary.row_count, 4);
    assert_eq!(footer.signal.summary.row_count, 8);

    let chunks = collect_signal_chunks(&path);
    assert_eq!(chunks.len(), 8);
    let samples: u64 = chunks.iter().map(|(_, count)| *count as u64).sum();
    assert_eq!(samples, 2500 + 800 + 2000 + 1200);
}

#[test]
fn test_malformed_pre_compressed_reads_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("malformed.pod5");

    let mut sim = ReadSimulator::new(13);
    let mut read = sim.next_read_pre_compressed(1000, 500).unwrap();
    if let ReadSignal::Compressed {
        chunk_sample_counts,
        ..
    } = &mut read.signal
    {
        chunk_sample_counts.pop();
    }

    let mut writer = Writer::create(&path).unwrap();
    let err = writer.add_read(read).unwrap_err();
    assert!(err.to_string().contains("malformed pre-compressed read"));

    // The writer stays usable after rejecting a bad read
    writer.add_read(sim.next_read(300)).unwrap();
    writer.close().unwrap();
    assert_eq!(read_footer(&path).reads.summary.row_count, 1);
}

#[test]
fn test_reads_with_empty_signal_are_stored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty_signal.pod5");

    let mut sim = ReadSimulator::new(17);
    let mut writer = Writer::create(&path).unwrap();
    writer.add_read(sim.next_read(0)).unwrap();
    writer.close().unwrap();

    let footer = read_footer(&path);
    assert_eq!(footer.reads.summary.row_count, 1);
    assert_eq!(footer.signal.summary.row_count, 0);
}

#[test]
fn test_closed_writer_reports_a_clear_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sealed.pod5");

    let mut sim = ReadSimulator::new(19);
    let mut writer = Writer::create(&path).unwrap();
    writer.add_read(sim.next_read(400)).unwrap();
    writer.close().unwrap();
    writer.close().unwrap();

    let err = writer.add_read(sim.next_read(400)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "File writer closed, cannot write further data"
    );
}

#[test]
fn test_existing_files_are_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("taken.pod5");
    std::fs::write(&path, b"occupied").unwrap();

    let err = Writer::create(&path).unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn test_split_files_carry_both_tables() {
    let dir = tempdir().unwrap();
    let signal_path = dir.path().join("run_signal.pod5");
    let reads_path = dir.path().join("run_reads.pod5");

    let mut sim = ReadSimulator::new(23);
    let mut writer =
        Writer::create_split(&signal_path, &reads_path, FileWriterOptions::default()).unwrap();
    let file_identifier = *writer.file_writer().file_identifier();

    writer.add_read(sim.next_read(1200)).unwrap();
    writer.add_read(sim.next_read_pre_compressed(900, 300).unwrap()).unwrap();
    writer.close().unwrap();

    for path in [&signal_path, &reads_path] {
        let mut file = File::open(path).unwrap();
        check_file_signature(&mut file).unwrap();
        check_section_marker(&mut file, &file_identifier).unwrap();
        let schema = read_schema(&mut file).unwrap();
        assert_eq!(schema.file_identifier, file_identifier);
    }
}
