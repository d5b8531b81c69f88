use crate::parser::ast::Command;
use crate::runtime::Runtime;
use super::Dispatch;
use std::io::{self, Write};

const DRAGON: &str = r#"
                         __====-_  _-====__
                   _--^^^#####//      \\#####^^^--_
                _-^##########// (    ) \\##########^-_
               -############//  |\^^/|  \\############-
             _/############//   (@::@)   \\############\_
            /#############((     \\//     ))#############\
           -###############\\    (oo)    //###############-
          -#################\\  / VV \  //#################-
         -###################\\/      \//###################-
        _#/|##########/\######(   /\   )######/\##########|\#_
        |/ |#/\#/\#/\/  \#/\##\  |  |  /##/\#/  \/\#/\#/\#| \|
        `  |/  V  V  `   V  \#\| |  | |/#/  V   '  V  V  \|  '
           `   `  `      `   / | |  | | \   '      '  '   '
                            (  | |  | |  )
                           __\ | |  | | /__
                          (vvv(VVV)(VVV)vvv)
"#;

pub(super) fn builtin_dragon(
    _cmd: &Command,
    _runtime: &mut Runtime,
    out: &mut dyn Write,
) -> io::Result<Dispatch> {
    out.write_all(DRAGON.trim_start_matches('\n').as_bytes())?;
    Ok(Dispatch::Executed)
}
