use clap::Parser;

use arcadia::assets::AssetView;
use arcadia::assets::cache::AssetCache;
use arcadia::assets::fetcher::HttpFetcher;
use arcadia::settings::CliArgs;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let cache = AssetCache::new(HttpFetcher::new(), args.assets_root.clone());
    match cache.load(&args.kind, &args.locator).await? {
        Some(view) => describe(&view),
        None => println!("{}: rejected by the script admission gate", args.locator),
    }

    Ok(())
}

fn describe(view: &AssetView) {
    match view {
        AssetView::Model(model) => {
            let instance = model.instantiate();
            println!(
                "model: {} nodes, {} clips",
                instance.count(),
                model.document().animations.len()
            );
        }
        AssetView::Avatar(avatar) => {
            let instance = avatar.instantiate();
            match &avatar.factory {
                Some(factory) => println!(
                    "avatar: {} nodes, rig v{}, standing height {:.2}",
                    instance.count(),
                    factory.rig_version(),
                    factory.height()
                ),
                None => println!("avatar: {} nodes, no usable rig (degraded)", instance.count()),
            }
        }
        AssetView::Emote(emote) => {
            let clip = emote.clip();
            println!(
                "emote: clip {:?}, {} tracks, {:.2}s",
                clip.name,
                clip.tracks.len(),
                clip.duration()
            );
        }
        AssetView::Script(script) => {
            println!("script: {} bytes admitted", script.source().len());
        }
    }
}
