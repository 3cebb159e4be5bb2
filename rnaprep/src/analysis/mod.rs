pub mod roc;
