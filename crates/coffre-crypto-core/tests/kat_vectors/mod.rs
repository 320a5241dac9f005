mod envelope;
mod pbkdf2_sha256;
