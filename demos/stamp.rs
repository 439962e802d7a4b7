use apkstamp::android::zip::ApkFile;
use apkstamp::template::{stamp_apk, TemplateConfig};
use std::env;
use std::error::Error;

// Stamps a template APK with the identity described in a JSON config, e.g.
//
// {
//   "packageName": "com.example.myapp",
//   "appName": "My App",
//   "url": "https://example.org",
//   "statusBarDark": false
// }
//
// The output is unsigned: run it through apksigner before installing.

//Usage: stamp <template.apk> <config.json> <out.apk>
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        println!("Usage: {} <template.apk> <config.json> <out.apk>", args[0]);
        return;
    }

    match stamp(&args[1], &args[2], &args[3]) {
        Ok(_) => println!("All done: written {}", args[3]),
        Err(e) => println!("Aborted due to error: {e}"),
    }
}

fn stamp(template: &str, config: &str, output: &str) -> Result<(), Box<dyn Error>> {
    let config = TemplateConfig::from_file(config)?;
    let mut apk = ApkFile::from_file(template)?;

    let report = stamp_apk(&mut apk, &config)?;
    println!(
        "{}: {} manifest and {} resource occurrences patched",
        config.package_name,
        report.manifest.len(),
        report.resources.len()
    );
    for name in &report.removed_signature_entries {
        println!("Dropped stale signature entry {name}");
    }

    apk.write_to_file(output)?;
    Ok(())
}
