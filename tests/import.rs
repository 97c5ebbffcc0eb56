use std::io::Write;

use tempfile::NamedTempFile;
use wigrange::{BedGraphDecoder, Config, Error, RangeImporter, SourceError};

const TRACK: &str = "track type=bedGraph name=signal\n\
    chr1\t0\t100\t1.0\n\
    chr1\t100\t150\t2.5\n\
    chr1\t200\t210\tnan\n\
    chr12\t1000\t1010\t7.0\n\
    chrX\t5\t6\t-3.0\n";

fn track_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".bedGraph")
        .tempfile()
        .expect("create temp track");
    file.write_all(contents.as_bytes()).expect("write track");
    file.flush().expect("flush track");
    file
}

fn path(file: &NamedTempFile) -> String {
    file.path().to_str().expect("utf-8 temp path").to_string()
}

fn importer(max_handles: usize) -> RangeImporter {
    RangeImporter::new(
        Config::default().with_max_handles(max_handles),
        BedGraphDecoder,
    )
}

#[test]
fn output_has_one_value_per_position() {
    let file = track_file(TRACK);
    let importer = importer(4);
    for (start, end) in [(1, 1), (1, 100), (95, 105), (140, 300), (1_000_000, 1_000_009)] {
        let values = importer
            .import_range(&path(&file), "chr1", start, end)
            .unwrap();
        assert_eq!(values.len() as i64, end - start + 1, "range {start}-{end}");
    }
}

#[test]
fn values_follow_records() {
    let file = track_file(TRACK);
    let importer = importer(4);

    // positions 99..=102 are 0-based 98..=101
    let values = importer.import_range(&path(&file), "chr1", 99, 102).unwrap();
    assert_eq!(values, vec![1.0, 1.0, 2.5, 2.5]);

    let values = importer.import_range(&path(&file), "chrX", 5, 7).unwrap();
    assert_eq!(values, vec![0.0, -3.0, 0.0]);
}

#[test]
fn chr_prefix_is_optional() {
    let file = track_file(TRACK);
    let importer = importer(4);
    let with = importer.import_range(&path(&file), "chr12", 995, 1015).unwrap();
    let without = importer.import_range(&path(&file), "12", 995, 1015).unwrap();
    assert_eq!(with, without);
    assert_eq!(with.iter().filter(|&&v| v == 7.0).count(), 10);

    let bare = track_file("12\t1000\t1010\t7.0\n");
    let prefixed = importer.import_range(&path(&bare), "chr12", 995, 1015).unwrap();
    assert_eq!(prefixed, with);
}

#[test]
fn empty_region_is_all_zero() {
    let file = track_file(TRACK);
    let values = importer(4)
        .import_range(&path(&file), "chr1", 151, 200)
        .unwrap();
    assert_eq!(values.len(), 50);
    assert!(values.iter().all(|&v| v == 0.0));
}

#[test]
fn nan_values_are_zero() {
    let file = track_file(TRACK);
    let values = importer(4)
        .import_range(&path(&file), "chr1", 199, 212)
        .unwrap();
    assert!(values.iter().all(|v| !v.is_nan()));
    assert!(values.iter().all(|&v| v == 0.0));
}

#[test]
fn repeated_imports_agree() {
    let file = track_file(TRACK);
    let importer = importer(4);
    let first = importer.import_range(&path(&file), "chr1", 50, 160).unwrap();
    let second = importer.import_range(&path(&file), "chr1", 50, 160).unwrap();
    assert_eq!(first, second);
    assert_eq!(importer.cached_handles(), 1);
}

#[test]
fn reopens_after_explicit_close() {
    let file = track_file(TRACK);
    let importer = importer(4);
    let before = importer.import_range(&path(&file), "chr1", 1, 10).unwrap();
    assert_eq!(importer.cached_handles(), 1);

    importer.explicit_close();
    assert_eq!(importer.cached_handles(), 0);
    importer.explicit_close();

    let after = importer.import_range(&path(&file), "chr1", 1, 10).unwrap();
    assert_eq!(before, after);
    assert_eq!(importer.cached_handles(), 1);
}

#[test]
fn least_recently_used_handle_is_evicted() {
    let files: Vec<_> = (0..3).map(|_| track_file(TRACK)).collect();
    let ids: Vec<_> = files.iter().map(path).collect();
    let importer = importer(2);

    importer.import_range(&ids[0], "chr1", 1, 5).unwrap();
    importer.import_range(&ids[1], "chr1", 1, 5).unwrap();
    importer.import_range(&ids[0], "chr1", 1, 5).unwrap();
    importer.import_range(&ids[2], "chr1", 1, 5).unwrap();

    assert_eq!(importer.cached_handles(), 2);
    assert_eq!(importer.cached_identifiers(), vec![ids[0].clone(), ids[2].clone()]);

    // the evicted resource reopens transparently
    let values = importer.import_range(&ids[1], "chr1", 1, 5).unwrap();
    assert_eq!(values, vec![1.0; 5]);
    assert_eq!(importer.cached_identifiers(), vec![ids[2].clone(), ids[1].clone()]);
}

#[test]
fn invalid_range_is_rejected_before_io() {
    let importer = importer(4);
    for (start, end) in [(0, 10), (-5, 10), (10, 9)] {
        let err = importer
            .import_range("/definitely/not/here.bedGraph", "chr1", start, end)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }), "{err}");
    }
    assert_eq!(importer.cached_handles(), 0);
}

#[test]
fn missing_file_is_an_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.bedGraph");
    let importer = importer(4);

    let err = importer
        .import_range(missing.to_str().unwrap(), "chr1", 1, 10)
        .unwrap_err();
    assert!(
        matches!(err, Error::OpenFailure { source: SourceError::Io(_), .. }),
        "{err}"
    );
    assert_eq!(importer.cached_handles(), 0);
}

#[test]
fn unknown_name_lists_a_preview() {
    let contents: String = (1..=7)
        .map(|i| format!("chr{i}\t0\t10\t{i}.0\n"))
        .collect();
    let file = track_file(&contents);
    let err = importer(4)
        .import_range(&path(&file), "chrZ", 1, 10)
        .unwrap_err();

    match &err {
        Error::NameNotFound { name, preview, .. } => {
            assert_eq!(name, "chrZ");
            assert_eq!(preview, "chr1, chr2, chr3, chr4, chr5, ...");
        }
        other => panic!("expected NameNotFound, got {other}"),
    }
    assert!(err.to_string().contains("chrZ"));
}

#[test]
fn malformed_line_is_a_decode_error() {
    let file = track_file("chr1\t0\t10\n");
    let err = importer(4)
        .import_range(&path(&file), "chr1", 1, 10)
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }), "{err}");
}

#[test]
fn sequence_names_in_file_order() {
    let file = track_file(TRACK);
    let names = importer(4).sequence_names(&path(&file)).unwrap();
    assert_eq!(names, vec!["chr1", "chr12", "chrX"]);
}

#[test]
fn concurrent_callers_share_handles() {
    let file = track_file(TRACK);
    let id = path(&file);
    let importer = importer(2);
    let expected = importer.import_range(&id, "chr1", 90, 110).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..10 {
                    let values = importer.import_range(&id, "1", 90, 110).unwrap();
                    assert_eq!(values, expected);
                }
            });
        }
    });
    assert_eq!(importer.cached_handles(), 1);
}

#[test]
fn global_importer_round_trip() {
    let file = track_file(TRACK);
    let values = wigrange::import_range(&path(&file), "chrX", 6, 6).unwrap();
    assert_eq!(values, vec![-3.0]);
    wigrange::explicit_close();
    assert_eq!(wigrange::global().cached_handles(), 0);
}
