use fragslice_rs::alignment::{alignment_blocks, AlignedRead, MatePosition, ReadAlignmentBlock};
use rust_htslib::bam::record::{Cigar, CigarString, Record};

const PAIRED: u16 = 0x1;
const UNMAPPED: u16 = 0x4;
const MATE_UNMAPPED: u16 = 0x8;

fn record(pos: i64, cigar: Vec<Cigar>, flags: u16) -> Record {
    let read_len: u32 = cigar
        .iter()
        .map(|op| match op {
            Cigar::Match(n) | Cigar::Equal(n) | Cigar::Diff(n) | Cigar::Ins(n) | Cigar::SoftClip(n) => *n,
            _ => 0,
        })
        .sum();
    let seq: Vec<u8> = b"ACGT".iter().cycle().take(read_len as usize).copied().collect();
    let qual: Vec<u8> = (0..read_len).map(|i| (i % 40) as u8).collect();

    let mut rec = Record::new();
    rec.set(b"read1", Some(&CigarString(cigar)), &seq, &qual);
    rec.set_tid(1);
    rec.set_pos(pos);
    rec.set_flags(flags);
    rec
}

fn names() -> Vec<String> {
    vec!["chr5".to_string(), "chr6".to_string(), "chr7".to_string()]
}

#[test]
fn blocks_follow_cigar() {
    let rec = record(
        99,
        vec![
            Cigar::HardClip(3),
            Cigar::SoftClip(5),
            Cigar::Match(10),
            Cigar::Ins(2),
            Cigar::Match(4),
            Cigar::Del(3),
            Cigar::Equal(6),
            Cigar::RefSkip(100),
            Cigar::Diff(1),
            Cigar::Match(7),
        ],
        0,
    );

    let blocks = alignment_blocks(&rec).unwrap();
    assert_eq!(
        blocks,
        vec![
            ReadAlignmentBlock { reference_start: 100, read_start: 5, length: 10 },
            ReadAlignmentBlock { reference_start: 110, read_start: 17, length: 4 },
            ReadAlignmentBlock { reference_start: 117, read_start: 21, length: 6 },
            ReadAlignmentBlock { reference_start: 223, read_start: 27, length: 1 },
            ReadAlignmentBlock { reference_start: 224, read_start: 28, length: 7 },
        ]
    );
    assert_eq!(blocks[0].reference_end(), 109);
}

#[test]
fn unmapped_record_has_no_blocks() {
    let rec = record(99, vec![Cigar::Match(10)], UNMAPPED);
    assert!(alignment_blocks(&rec).unwrap().is_empty());
    assert!(AlignedRead::from_record(&rec, &names()).unwrap().is_none());
}

#[test]
fn decodes_read_and_mate() {
    let mut rec = record(99, vec![Cigar::Match(8)], PAIRED);
    rec.set_mtid(1);
    rec.set_mpos(299);

    let read = AlignedRead::from_record(&rec, &names()).unwrap().unwrap();
    assert_eq!(read.name, "read1");
    assert_eq!(read.contig, "chr6");
    assert_eq!(read.alignment_start, 100);
    assert_eq!(
        read.mate,
        Some(MatePosition { contig: "chr6".to_string(), alignment_start: 300 })
    );
    assert_eq!(read.bases, b"ACGTACGT".to_vec());
    assert_eq!(read.qualities, (0..8).collect::<Vec<u8>>());
}

#[test]
fn mate_absent_when_unpaired_or_unmapped() {
    let mut unpaired = record(99, vec![Cigar::Match(8)], 0);
    unpaired.set_mtid(1);
    unpaired.set_mpos(299);
    assert!(AlignedRead::from_record(&unpaired, &names()).unwrap().unwrap().mate.is_none());

    let mut mate_unmapped = record(99, vec![Cigar::Match(8)], PAIRED | MATE_UNMAPPED);
    mate_unmapped.set_mtid(1);
    mate_unmapped.set_mpos(99);
    assert!(AlignedRead::from_record(&mate_unmapped, &names()).unwrap().unwrap().mate.is_none());
}

#[test]
fn unknown_reference_id_is_an_error() {
    let mut rec = record(99, vec![Cigar::Match(8)], 0);
    rec.set_tid(9);
    assert!(AlignedRead::from_record(&rec, &names()).is_err());
}
