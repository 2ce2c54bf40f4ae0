// ─── BlockLaunch Core ───
// Backend for a vanilla Minecraft launcher, independent of any front end.
//
// Architecture:
//   core/
//     version/     Manifest catalog, version JSON model, OS/feature rules
//     downloader/  Streaming fetcher, SHA-1 verification, bounded batches
//     assets/      Asset index + sharded object downloads
//     launch/      Classpath, natives, command line, process supervisor
//     instance/    Game directory layout + installed-version scan
//     java/        Java executable resolution
//     auth/        Offline player profile
//     state/       Settings file + application state
//     sinks        Progress and game-output reporting traits

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod launch;
pub mod sinks;
pub mod state;
pub mod version;
