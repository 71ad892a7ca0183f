// Copyright 2025 Pika Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use pika_ds_img::ImageFile;
use pika_fs_fat12::Volume;

#[derive(Parser)]
#[command(about = "Print a file from a FAT12 disk image")]
struct Args {
    /// Disk image holding the FAT12 volume.
    #[arg(default_value = "example_fat12_volume.img")]
    image: PathBuf,
    /// 8.3 name of the file to print.
    #[arg(default_value = "MONEY")]
    name: String,
    /// Read at most this many bytes.
    #[arg(long, default_value_t = 10240)]
    limit: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let image = match ImageFile::open(&args.image) {
        Ok(image) => image,
        Err(error) => {
            eprintln!("{}: {error}", args.image.display());
            return ExitCode::from(1);
        }
    };
    let volume = match Volume::open(&image, 0) {
        Ok(volume) => volume,
        Err(error) => {
            eprintln!("{}: not a FAT12 volume: {error}", args.image.display());
            return ExitCode::from(2);
        }
    };
    let mut file = match volume.open_file(&args.name) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("{}: {error}", args.name);
            return ExitCode::from(3);
        }
    };

    let mut content = vec![0u8; args.limit];
    let read = match file.read(&mut content, 1, args.limit) {
        Ok(read) => read,
        Err(error) => {
            eprintln!("{}: {error}", args.name);
            return ExitCode::from(2);
        }
    };
    io::stdout().write_all(&content[..read]).ok();

    ExitCode::SUCCESS
}
