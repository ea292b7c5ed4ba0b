//! Pipeline stages for one food-photo submission.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ compose ──▶ inference
//!  (RGB JPEG)    (prompt)    (hosted VLM)
//! ```
//!
//! 1. [`normalize`] — decode the upload, force RGB, re-encode as JPEG
//! 2. [`compose`]   — prefix the instruction template to the user's text and
//!    pair it with the image
//! 3. [`inference`] — the [`inference::InferenceClient`] seam and the
//!    edgequake-llm backed client; [`gemini`] holds the default REST client.
//!    The only stage with network I/O.

pub mod compose;
pub mod gemini;
pub mod inference;
pub mod normalize;
