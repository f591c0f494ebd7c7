//! Compiles the mesh protobuf definitions.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("PROTOC").is_err() {
        unsafe {
            std::env::set_var(
                "PROTOC",
                protoc_bin_vendored::protoc_bin_path()
                    .expect("protoc binary not found in vendored crate"),
            );
        }
    }
    println!("cargo:rerun-if-changed=proto/mesh.proto");
    // The `Connect` rpc would clash with the generated `Client::connect` dialer.
    tonic_prost_build::configure()
        .build_transport(false)
        .compile_protos(&["proto/mesh.proto"], &["proto"])?;
    Ok(())
}
