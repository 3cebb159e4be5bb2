use std::fs;
use std::path::Path;

use rnaprep::datafolder::{convert, ConvertOptions};
use rnaprep::models::Format;
use serde_json::Value;

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn fasta_duplicates_collapse() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("pairs.fasta");
    fs::write(&input, ">first\nGGGAAACCC\n>second\nGGGAAACCC\n").unwrap();

    let options = ConvertOptions::new(Format::Fasta, &input, dir.path().join("out"));
    let conversion = convert(&options, None).unwrap();

    assert_eq!(conversion.datapoints.len(), 1);
    assert_eq!(conversion.report.n_duplicates, 1);
    assert_eq!(conversion.report.n_invalid, 0);

    let folder = &conversion.datafolder;
    assert_eq!(folder.name, "pairs");
    let data = read_json(&folder.data_json());
    assert_eq!(data["first"]["sequence"], "GGGAAACCC");
    assert!(data.get("second").is_none());

    let report = fs::read_to_string(folder.conversion_report()).unwrap();
    assert!(report.contains("- 1 duplicate sequences with the same structure / dms / shape"));
    assert!(folder.source_dir().join("pairs.fasta").exists());
    assert!(folder.readme().exists());
}

#[test]
fn json_with_structure_and_signal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("probed.json");
    fs::write(
        &input,
        r#"{
            "good": {"sequence": "AACCGG", "structure": [[1, 2], [3, 4]], "dms": [1, 0, 0, 0, 0, 1]},
            "noisy": {"sequence": "AUGGC", "structure": [[0, 4], [2, 3]], "dms": [0, 0, 0, 0, 0]}
        }"#,
    )
    .unwrap();

    let options = ConvertOptions {
        generate_npy: true,
        ..ConvertOptions::new(Format::Json, &input, dir.path())
    };
    let conversion = convert(&options, None).unwrap();

    let references: Vec<&str> = conversion.datapoints.iter().map(|dp| dp.reference()).collect();
    assert_eq!(references, vec!["good"]);
    assert_eq!(conversion.report.n_low_auroc, 1);

    let folder = &conversion.datafolder;
    let auroc = fs::read_to_string(folder.auroc_csv()).unwrap();
    assert!(auroc.contains("good,dms,1.0,true"));
    assert!(auroc.contains("noisy,dms,0.0,false"));

    for file in ["references.npy", "sequences.npy", "base_pairs.npy", "dms.npy"] {
        assert!(folder.path().join(file).exists(), "{file} missing");
    }
    assert!(!folder.path().join("shape.npy").exists());

    let info = read_json(&folder.info_json());
    assert_eq!(info["name"], "probed");
    assert_eq!(info["structure"], "source");
}

#[test]
fn invalid_sequence_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.fasta");
    fs::write(&input, ">ref\nnot a valid sequence\n").unwrap();

    let conversion = convert(&ConvertOptions::new(Format::Fasta, &input, dir.path()), None).unwrap();
    assert!(conversion.datapoints.is_empty());
    assert_eq!(conversion.report.n_invalid, 1);
    assert_eq!(
        fs::read_to_string(conversion.datafolder.data_json()).unwrap(),
        "{\n}"
    );
}

#[test]
fn ct_folder_without_filter() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cts");
    fs::create_dir(&input).unwrap();
    let hairpin = "6 hairpin\n1 G 0 2 6 1\n2 G 1 3 5 2\n3 A 2 4 0 3\n4 A 3 5 0 4\n5 C 4 6 2 5\n6 C 5 0 1 6\n";
    fs::write(input.join("one.ct"), hairpin).unwrap();
    fs::write(input.join("two.ct"), hairpin).unwrap();

    let options = ConvertOptions {
        filter: None,
        ..ConvertOptions::new(Format::Ct, &input, dir.path().join("out"))
    };
    let conversion = convert(&options, None).unwrap();

    // duplicates survive when only invalid records are dropped
    assert_eq!(conversion.datapoints.len(), 2);
    let data = read_json(&conversion.datafolder.data_json());
    assert_eq!(data["two"]["structure"], serde_json::json!([[0, 5], [1, 4]]));
    assert!(conversion.datafolder.source_dir().join("one.ct").exists());
}
