mod instance;
mod timer;
