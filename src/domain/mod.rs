// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that name the concepts
// of the system: garments, outfits and task kinds.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Garments, raw images and outfits
pub mod item;

// The closed set of task kinds and their external tags
pub mod task;

// Core abstractions (traits) that other layers implement
pub mod traits;
