/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the typed record codec and the OTPM image indexer.

--*/

mod nvm;
mod otpm;

pub use nvm::*;
pub use otpm::OtpmImage;
