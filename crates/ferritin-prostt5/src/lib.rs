//! ferritin-prostt5
//!
//! Predict Foldseek 3Di structural states from amino acid sequences with the
//! ProstT5 protein language model.
//!
//! The inference runtime sits behind the traits in [`runtime`]; this crate
//! maps residues to vocabulary tokens, runs one encoder pass per sequence and
//! decodes the per-position class scores into one 3Di letter per residue.
//!
//! ```no_run
//! use ferritin_prostt5::candle::CandleBackend;
//! use ferritin_prostt5::{ProstT5Model, Runtime, RuntimeOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = Runtime::init(CandleBackend::new(), RuntimeOptions::default())?;
//! let model = ProstT5Model::load(&runtime, "weights/prostt5", "none")?;
//! let mut session = model.session(4)?;
//! let states = session.predict("MKTAYIAKQRQISFVKSHFSRQ");
//! assert_eq!(states.len(), 22);
//! # Ok(())
//! # }
//! ```
//!
//! ```shell
//! cargo run --release -- predict --model weights/prostt5 --input seqs.fasta
//! cargo run --release --features cuda -- predict --model weights/prostt5 --device CUDA0 --input seqs.fasta
//! ```
pub mod alphabet;
pub mod bootstrap;
pub mod candle;
pub mod decode;
pub mod device;
pub mod error;
pub mod fasta;
pub mod hub;
pub mod model;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod tokenizer;

pub use alphabet::{index_to_3di, THREEDI_ALPHABET};
pub use bootstrap::{NumaStrategy, Runtime, RuntimeOptions};
pub use device::{list_devices, parse_device_list};
pub use error::PredictError;
pub use model::ProstT5Model;
pub use profile::{ModelProfile, ScoreLayout};
pub use runtime::PerfCounters;
pub use session::ProstT5;
