use anyhow::Result;
use ferritin_prostt5::candle::CandleBackend;
use ferritin_prostt5::{list_devices, Runtime, RuntimeOptions};

pub fn execute(verbose: bool) -> Result<()> {
    let options = RuntimeOptions {
        verbose,
        ..Default::default()
    };
    let runtime = Runtime::init(CandleBackend::new(), options)?;
    for name in list_devices(runtime.backend()) {
        println!("{name}");
    }
    Ok(())
}
