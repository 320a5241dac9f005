mod envelope_roundtrip;
mod generator_roundtrip;
