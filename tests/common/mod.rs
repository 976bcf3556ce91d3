#![allow(dead_code)]

use kernel_bridge::{
    bridge::{Bridge, BridgeOptions},
    host::Host,
    kernel::Kernel,
};

/// Kernel with a bridge installed and error capture on.
pub fn session() -> (Kernel, Bridge) {
    session_with(BridgeOptions::default())
}

pub fn session_with(options: BridgeOptions) -> (Kernel, Bridge) {
    let mut kernel = Kernel::new();
    let bridge = Bridge::init(&mut kernel, Host::new(), options)
        .unwrap_or_else(|e| panic!("bridge init failed: {}", e));
    (kernel, bridge)
}
