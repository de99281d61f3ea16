#[cfg(target_arch = "wasm32")]
fn main() {
    console_error_panic_hook::set_once();
    plotcanvas_client::web::logging::init();
    plotcanvas_client::web::mount();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("plotcanvas-client runs in the browser; build it for wasm32-unknown-unknown");
}
