fn main() {
    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    // ESP-IDF link arguments and cfgs are only needed for device builds.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
