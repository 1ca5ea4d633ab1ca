fn main() {
    // The ESP-IDF environment is only needed when building the device image.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
