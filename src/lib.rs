// THEORY:
// This crate is the ground-station side of a Jetson vision link. The sensor
// publishes JSON telemetry (probabilities plus a JPEG frame) over a ZeroMQ
// socket; this process turns that stream into an operator console: a live
// annotated MJPEG view in the browser, on-demand AVI recording of the
// annotated stream, and one-click raw-photo capture for dataset building.
//
// The shape of the program is one ingest loop that owns every mutating
// resource (frame store writes, the video writer, the recording state
// machine) plus stateless HTTP handlers that only read shared state or send
// latest-wins signals back to the loop. Every hand-off between the two sides
// is a single-slot cell: the newest value wins and nobody ever blocks on a
// slow peer.

pub mod avi;
pub mod broadcast;
pub mod config;
pub mod context;
pub mod error;
pub mod font;
pub mod ingest;
pub mod overlay;
pub mod recording;
pub mod sample;
pub mod server;
pub mod snapshot;
pub mod store;
