pub static HELP_GENERAL: &str = "HELP GENERAL\n\
pixelflut - a pixel drawing game for programmers inspired by reddits r/place.\n\
\n\
Available subcommands are:\n\
HELP\t- This help message\n\
SIZE\t- Get the current canvas size\n\
PX\t- Get or set one specific pixels color\n\
STATE\t- Get the whole canvas in a specific encoding\n\
\n\
More detailed descriptions about these subcommands is available by sending 'HELP <subcommand>'\n\
\n\
All commands end with a newline character (\\n) and need to be sent as UTF-8 encoded strings.\n\
Commands are case-insensitive.\n\
Responses are also always newline terminated.\n";

pub static HELP_SIZE: &str = "HELP SIZE\n\
Syntax:\t\tSIZE\n\
Response:\tSIZE <width> <height>\n\
\n\
Returns the current canvas size.\n\
This server does not support changing the canvas size at runtime so the result can safely be cached\n";

pub static HELP_PX: &str = "HELP PX\n\
Syntax:\t\tPX <x> <y> [<rgb>]\n\
Response:\tPX <x> <y> <rgb>\n\
\n\
Gets or sets the pixel color addressed by the coordinates <x> and <y>.\n\
The mode of operation is determined by the third argument (<rgb>) being present or not.\n\
If it is present, the pixel will be set to that color and the new color is returned.\n\
It it is not present, the current color will be returned.\n\
\n\
<x>\t- X position on the canvas counted from the left side\n\
<y>\t- Y position on the canvas counted from the top\n\
<rgb>\t- HEX encoded rgb color without # symbol (000000 - FFFFFF)\n";

pub static HELP_STATE: &str = "HELP STATE\n\
Syntax:\t\tSTATE [<algorithm>]\n\
Response:\tSTATE <algorithm> <data>\n\
\n\
Returns the whole canvas encoded with the given algorithm.\n\
If no algorithm is given, rgb64 is used.\n\
The returned state is refreshed periodically and may lag slightly behind the latest pixel updates.\n\
\n\
Available algorithms are:\n\
rgb64\t- 3 bytes (red, green, blue) per pixel in row-major order, then base64 encoded\n\
rgba64\t- 4 bytes (red, green, blue, alpha) per pixel in row-major order, then base64 encoded. Alpha is always 255\n";
