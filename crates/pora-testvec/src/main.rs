//! Test vector generator for PoRA mining.
//!
//! Generates `test_vectors.json` covering the hash layouts a second
//! implementation has to reproduce bit for bit.
//!
//! Usage:
//!   pora-testvec              # Generate test_vectors.json
//!   pora-testvec --verify     # Verify test vectors match expected values

use std::collections::BTreeMap;

use pora_crypto::keccak::{hash_pair, keccak256, sector_leaf, ZERO_HASH};
use pora_flow::merkle::IncrementalMerkle;
use pora_mine::quality::{compute_quality, difficulty_to_target};
use pora_mine::scratch_pad::{pad_seed, PadHasher, ScratchPad};
use pora_mine::seal::seal;
use pora_types::context::{MineContext, RecallRange};
use pora_types::U256;
use serde::{Deserialize, Serialize};

const PATH: &str = "tests/fixtures/test_vectors.json";

#[derive(Serialize, Deserialize)]
struct TestVectors {
    version: String,
    generated_by: String,
    vectors: BTreeMap<String, TestVector>,
}

#[derive(Serialize, Deserialize)]
struct TestVector {
    description: String,
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

fn vector(
    description: &str,
    inputs: &[(&str, String)],
    outputs: &[(&str, String)],
) -> TestVector {
    let own = |pairs: &[(&str, String)]| {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    };
    TestVector {
        description: description.to_string(),
        inputs: own(inputs),
        outputs: own(outputs),
    }
}

fn sample_context() -> MineContext {
    MineContext::new(3, 300, [0xaa; 32], 1 << 20, [0xbb; 32])
}

fn word_hex(value: U256) -> String {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    hex::encode(buf)
}

fn generate_hash_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();

    let empty_leaf = sector_leaf(&[0u8; 256]);
    vectors.insert(
        "empty_sector_leaf".to_string(),
        vector(
            "keccak256 of one all-zero sector; the padding leaf",
            &[("sector", "0x00*256".to_string())],
            &[("leaf", hex::encode(empty_leaf))],
        ),
    );
    vectors.insert(
        "zero_subtree_height_1".to_string(),
        vector(
            "keccak256(empty_leaf || empty_leaf)",
            &[("empty_leaf", hex::encode(empty_leaf))],
            &[("node", hex::encode(hash_pair(&empty_leaf, &empty_leaf)))],
        ),
    );

    let leaf = keccak256(b"pora leaf");
    let mut tree = IncrementalMerkle::new(32)?;
    tree.insert_node(leaf, 0)?;
    let root = tree.commit_root();
    vectors.insert(
        "accumulator_single_leaf".to_string(),
        vector(
            "commit after one height-0 leaf: keccak256(sentinel || leaf)",
            &[
                ("sentinel", hex::encode(ZERO_HASH)),
                ("leaf", hex::encode(leaf)),
            ],
            &[
                ("root", hex::encode(root)),
                ("length", tree.current_length().to_string()),
            ],
        ),
    );

    Ok(vectors)
}

fn generate_context_vectors() -> BTreeMap<String, TestVector> {
    let mut vectors = BTreeMap::new();
    let ctx = sample_context();
    let range = RecallRange::full(0, 1 << 20);

    vectors.insert(
        "context_digest".to_string(),
        vector(
            "keccak256(block_digest || flow_root || be256(flow_length))",
            &[
                ("block_digest", hex::encode(ctx.block_digest)),
                ("flow_root", hex::encode(ctx.flow_root)),
                ("flow_length", ctx.flow_length.to_string()),
            ],
            &[
                ("digest", hex::encode(ctx.digest)),
                ("subtask_digest", hex::encode(ctx.subtask_digest())),
            ],
        ),
    );
    vectors.insert(
        "recall_range_digest".to_string(),
        vector(
            "keccak256(be256(start) || be256(length) || be256(shard_id) || be256(shard_mask))",
            &[
                ("start_position", range.start_position.to_string()),
                ("mine_length", range.mine_length.to_string()),
                ("shard_id", range.shard_id.to_string()),
                ("shard_mask", format!("{:#x}", range.shard_mask)),
            ],
            &[("digest", hex::encode(range.digest()))],
        ),
    );
    vectors
}

fn generate_mining_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();
    let ctx = sample_context();
    let range = RecallRange::full(0, 1 << 20);
    let miner_id = [0x11; 32];
    let nonce = [0x22; 32];

    let seed = pad_seed(&miner_id, &nonce, &ctx.subtask_digest(), &range.digest());
    for (name, hasher) in [
        ("double_keccak", PadHasher::DoubleKeccak),
        ("blake2b", PadHasher::Blake2b),
    ] {
        let pad = ScratchPad::generate(seed, hasher);
        let chunk = pad.chunk_offset(range.mine_length / 1024)?;
        vectors.insert(
            format!("scratch_pad_{name}"),
            vector(
                "1024-step pad chain from blake2b512(miner_id || nonce || subtask || recall)",
                &[
                    ("miner_id", hex::encode(miner_id)),
                    ("nonce", hex::encode(nonce)),
                    ("context_digest", hex::encode(ctx.digest)),
                ],
                &[
                    ("seed", hex::encode(seed)),
                    ("first", hex::encode(pad.items()[0])),
                    ("last", hex::encode(pad.last())),
                    ("chunk_offset", chunk.to_string()),
                ],
            ),
        );
    }

    let units: Vec<[u8; 32]> = (0..128u8).map(|i| [i; 32]).collect();
    let sealed = seal(&miner_id, &ctx.digest, 16, &units);
    vectors.insert(
        "seal_batch".to_string(),
        vector(
            "chained seal of units [i; 32] for i in 0..128 at position 16",
            &[
                ("miner_id", hex::encode(miner_id)),
                ("context_digest", hex::encode(ctx.digest)),
            ],
            &[
                ("unit_0", hex::encode(sealed[0])),
                ("unit_127", hex::encode(sealed[127])),
            ],
        ),
    );

    let pad = ScratchPad::generate(seed, PadHasher::DoubleKeccak);
    let mixed = pad.mix(11, &sealed)?;
    let quality = compute_quality(11, pad.seed(), &mixed);
    vectors.insert(
        "quality".to_string(),
        vector(
            "blake2b512(be256(seal_offset) || seed || 0x00*32 || mixed)[..32], seal_offset 11",
            &[("seed", hex::encode(seed))],
            &[("quality", word_hex(quality))],
        ),
    );

    let target = difficulty_to_target(U256::from(180_000u64));
    vectors.insert(
        "difficulty_target".to_string(),
        vector(
            "floor((2^256 - 1) / difficulty)",
            &[("difficulty", "180000".to_string())],
            &[("target", word_hex(target))],
        ),
    );
    Ok(vectors)
}

fn generate_all_vectors() -> anyhow::Result<TestVectors> {
    let mut all_vectors = BTreeMap::new();

    all_vectors.extend(generate_hash_vectors()?);
    all_vectors.extend(generate_context_vectors());
    all_vectors.extend(generate_mining_vectors()?);

    Ok(TestVectors {
        version: "1.0".to_string(),
        generated_by: "pora-testvec".to_string(),
        vectors: all_vectors,
    })
}

fn verify_vectors(vectors: &TestVectors) -> anyhow::Result<bool> {
    let regenerated = generate_all_vectors()?;
    let mut all_pass = true;

    for (name, expected) in &vectors.vectors {
        if let Some(actual) = regenerated.vectors.get(name) {
            if actual.outputs != expected.outputs {
                eprintln!("FAIL: {name}");
                eprintln!("  expected: {:?}", expected.outputs);
                eprintln!("  actual:   {:?}", actual.outputs);
                all_pass = false;
            } else {
                eprintln!("PASS: {name}");
            }
        } else {
            eprintln!("MISSING: {name}");
            all_pass = false;
        }
    }

    Ok(all_pass)
}

fn write_vectors(vectors: &TestVectors) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(PATH).parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(PATH, serde_json::to_string_pretty(vectors)?)?;
    eprintln!("Generated {} test vectors to {PATH}", vectors.vectors.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let verify = std::env::args().any(|a| a == "--verify");

    let vectors = match std::fs::read_to_string(PATH) {
        // Verify mode: load existing vectors and check
        Ok(content) if verify => serde_json::from_str(&content)?,
        _ => {
            let vectors = generate_all_vectors()?;
            write_vectors(&vectors)?;
            vectors
        }
    };

    if verify_vectors(&vectors)? {
        eprintln!("All test vectors verified successfully.");
        Ok(())
    } else {
        anyhow::bail!("test vector verification failed")
    }
}
