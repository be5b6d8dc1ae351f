/// Frame extraction from AC-3 bitstreams.
///
/// Provides [`find_sync`](extract::find_sync) for locating a syncframe in a
/// buffer and the streaming [`Extractor`](extract::Extractor), which splits
/// continuous bitstream data into whole [`Frame`](extract::Frame) objects.
pub mod extract;

/// Frame decoding to transform coefficients.
///
/// Provides the [`Decoder`](decode::Decoder) for turning syncframes into
/// [`FrameCoefficients`](decode::FrameCoefficients).
pub mod decode;
