pub mod frame_controller;
