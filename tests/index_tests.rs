//! Integration tests for tabix index construction, persistence and queries

use genotrack::formats::index::{build_index, write_index, IndexBuilder, IndexedReader, TabixIndex};
use genotrack::formats::records::{
    Bed, IndexedRecord, RecordFormat, RecordReader, TabularRecordReader, Vcf,
};
use genotrack::io::{BgzfReader, BgzfWriter};
use genotrack::{GenotrackError, ProjectContext};
use proptest::prelude::*;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Block-compress `lines`, starting a new block every `per_block` lines
fn bgzf_lines(lines: &[String], per_block: usize) -> Vec<u8> {
    let mut writer = BgzfWriter::new(Vec::new());
    for (i, line) in lines.iter().enumerate() {
        writeln!(writer, "{}", line).unwrap();
        if (i + 1) % per_block == 0 {
            writer.flush_block().unwrap();
        }
    }
    writer.finish().unwrap()
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn bed_lines(records: &[(&str, u64, u64)]) -> Vec<String> {
    records
        .iter()
        .map(|(chrom, start, end)| format!("{}\t{}\t{}", chrom, start, end))
        .collect()
}

fn index_in_memory(data: &[u8]) -> (TabixIndex, Vec<IndexedRecord>) {
    let source = BgzfReader::new(Cursor::new(data.to_vec())).unwrap();
    let mut reader = TabularRecordReader::new(source, Bed);
    let mut builder = IndexBuilder::new(Bed.config());
    let mut all = Vec::new();
    while let Some(record) = reader.read_record().unwrap() {
        builder
            .add_record(
                &record.chrom,
                record.start,
                record.end,
                record.begin_offset,
                record.end_offset,
            )
            .unwrap();
        all.push(record);
    }
    (builder.finish(), all)
}

/// Minimal raw TBI: one reference, one bin, two linear entries
fn create_minimal_tbi() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"TBI\x01");
    data.extend_from_slice(&1i32.to_le_bytes()); // n_ref
    data.extend_from_slice(&2i32.to_le_bytes()); // format = VCF
    data.extend_from_slice(&1i32.to_le_bytes()); // col_seq
    data.extend_from_slice(&2i32.to_le_bytes()); // col_beg
    data.extend_from_slice(&0i32.to_le_bytes()); // col_end
    data.extend_from_slice(&(b'#' as i32).to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes()); // skip
    data.extend_from_slice(&5i32.to_le_bytes()); // l_nm
    data.extend_from_slice(b"chr1\0");

    data.extend_from_slice(&1i32.to_le_bytes()); // n_bin
    data.extend_from_slice(&4681u32.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes()); // n_chunk
    data.extend_from_slice(&0x1000u64.to_le_bytes());
    data.extend_from_slice(&0x2000u64.to_le_bytes());

    data.extend_from_slice(&2i32.to_le_bytes()); // n_intv
    data.extend_from_slice(&0x1000u64.to_le_bytes());
    data.extend_from_slice(&0x1500u64.to_le_bytes());
    data
}

#[test]
fn test_tbi_parse_minimal() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "minimal.tbi", &create_minimal_tbi());

    let index = TabixIndex::from_path(&path).unwrap();
    let config = index.config();
    assert_eq!(config.col_seq, 1);
    assert_eq!(config.col_beg, 2);
    assert_eq!(config.col_end, 0);
    assert_eq!(config.meta_char, '#');
    assert!(!config.zero_based);

    assert_eq!(index.references().len(), 1);
    let chr1 = index.get_reference("chr1").unwrap();
    assert_eq!(chr1.bin_count(), 1);
    assert_eq!(chr1.linear_index().len(), 2);

    let pairs = index.query_interval("chr1", 0, 100).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].begin.as_raw(), 0x1000);
}

#[test]
fn test_tbi_bad_magic() {
    let mut data = create_minimal_tbi();
    data[0] = b'X';
    assert!(TabixIndex::from_bytes(&data).is_err());
}

#[test]
fn test_absent_chromosome_is_empty() {
    let data = bgzf_lines(&bed_lines(&[("chr1", 0, 10), ("chr1", 20, 30)]), 1);
    let (index, _) = index_in_memory(&data);
    assert!(index.query_interval("chrM", 0, 1000).unwrap().is_empty());

    let mut reader = IndexedReader::new(BgzfReader::new(Cursor::new(data)).unwrap(), &index, Bed);
    assert!(reader.query("chrM", 0, 1000).unwrap().is_empty());
}

#[test]
fn test_rebuild_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let records: Vec<(&str, u64, u64)> = (0..500)
        .map(|i| {
            let chrom = if i < 300 { "chr1" } else { "chr2" };
            (chrom, (i % 300) * 3_000, (i % 300) * 3_000 + 20_000)
        })
        .collect();
    let path = write_file(dir.path(), "tiles.bed.gz", &bgzf_lines(&bed_lines(&records), 7));

    let first = build_index(&path, Bed, None).unwrap().to_bytes().unwrap();
    let second = build_index(&path, Bed, None).unwrap().to_bytes().unwrap();
    assert_eq!(first, second);

    let index_path = write_index(&path, Bed, None).unwrap();
    assert_eq!(index_path, dir.path().join("tiles.bed.gz.tbi"));
    assert_eq!(std::fs::read(&index_path).unwrap(), first);
}

#[test]
fn test_persisted_index_answers_like_built_one() {
    let dir = TempDir::new().unwrap();
    let records: Vec<(&str, u64, u64)> =
        (0..200).map(|i| ("chr1", i * 10_000, i * 10_000 + 5_000)).collect();
    let path = write_file(dir.path(), "spaced.bed.gz", &bgzf_lines(&bed_lines(&records), 10));

    let built = build_index(&path, Bed, None).unwrap();
    let index_path = dir.path().join("spaced.bed.gz.tbi");
    built.write_atomic(&index_path).unwrap();
    let loaded = TabixIndex::from_path(&index_path).unwrap();

    for (start, end) in [(0, 10), (123_456, 456_789), (1_990_000, 1_999_999)] {
        assert_eq!(
            built.query_interval("chr1", start, end).unwrap(),
            loaded.query_interval("chr1", start, end).unwrap()
        );
    }
}

#[test]
fn test_failed_build_publishes_nothing() {
    let dir = TempDir::new().unwrap();
    let unsorted = bed_lines(&[("chr1", 500, 600), ("chr1", 100, 200)]);
    let path = write_file(dir.path(), "unsorted.bed.gz", &bgzf_lines(&unsorted, 1));

    let err = write_index(&path, Bed, None).unwrap_err();
    assert!(matches!(err, GenotrackError::InvalidInput { .. }));
    assert!(!dir.path().join("unsorted.bed.gz.tbi").exists());
}

#[test]
fn test_context_checks_during_build() {
    let dir = TempDir::new().unwrap();
    let lines = bed_lines(&[("chr1", 0, 10), ("chr1", 900, 1_200)]);
    let path = write_file(dir.path(), "long.bed.gz", &bgzf_lines(&lines, 1));

    let ctx = ProjectContext::from_pairs([("chr1", 1_000)]).unwrap();
    let err = build_index(&path, Bed, Some(&ctx)).unwrap_err();
    assert!(matches!(err, GenotrackError::InvalidRange(_)));

    let index = build_index(&path, Bed, None).unwrap();
    assert!(index.query_in(&ctx, "chr1", 0, 999).is_ok());
    assert!(index.query_in(&ctx, "chr1", 0, 1_000).is_err());
}

#[test]
fn test_vcf_index_and_query() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = vec![
        "##fileformat=VCFv4.2".to_string(),
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO".to_string(),
        "chr1\t100\t.\tA\tG\t.\tPASS\t.".to_string(),
        "chr1\t200\t.\tACGTA\tA\t.\tPASS\t.".to_string(),
        "chr1\t20000\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=40000".to_string(),
        "chr2\t5\t.\tC\tT\t.\tPASS\t.".to_string(),
    ];
    let path = write_file(dir.path(), "calls.vcf.gz", &bgzf_lines(&lines, 2));
    let index = build_index(&path, Vcf, None).unwrap();

    let mut reader = IndexedReader::new(BgzfReader::from_path(&path).unwrap(), &index, Vcf);
    // 0-based 202 lies inside the bases deleted by the POS 200 record
    let hits = reader.query("chr1", 202, 202).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].line.contains("ACGTA"));

    let hits = reader.query("chr1", 30_000, 30_000).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].line.contains("<DEL>"));
}

fn synthetic_records() -> impl Strategy<Value = Vec<(u8, u64, u64)>> {
    prop::collection::vec((0u8..2, 0u64..2_000_000, 0u64..150_000), 1..150).prop_map(|mut v| {
        v.sort_by_key(|&(chrom, start, _)| (chrom, start));
        v
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_no_false_negatives(
        records in synthetic_records(),
        queries in prop::collection::vec((0u8..2, 0u64..2_200_000, 0u64..300_000), 1..20),
    ) {
        let names = ["chr1", "chr2"];
        let lines: Vec<String> = records
            .iter()
            .map(|&(c, start, len)| format!("{}\t{}\t{}\tr", names[c as usize], start, start + len))
            .collect();
        let data = bgzf_lines(&lines, 5);
        let (index, all) = index_in_memory(&data);
        let mut reader = IndexedReader::new(BgzfReader::new(Cursor::new(data)).unwrap(), &index, Bed);

        for &(c, start, width) in &queries {
            let chrom = names[c as usize];
            let end = start + width;
            let expected: Vec<&IndexedRecord> = all
                .iter()
                .filter(|r| r.chrom == chrom && r.overlaps(start, end))
                .collect();

            // Every overlapping record starts inside one of the candidate ranges
            let pairs = index.query_interval(chrom, start, end).unwrap();
            for record in &expected {
                prop_assert!(pairs.iter().any(|p| p.contains(record.begin_offset)));
            }

            let found = reader.query(chrom, start, end).unwrap();
            prop_assert_eq!(found.len(), expected.len());
            for (got, want) in found.iter().zip(expected.iter()) {
                prop_assert_eq!(got.begin_offset, want.begin_offset);
            }
        }
    }
}
